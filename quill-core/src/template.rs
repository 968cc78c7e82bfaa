//! Template rendering for prompt bodies.
//!
//! Substitutes `{{variable}}` placeholders with caller-provided values.
//! Placeholders with no matching variable are left intact, matching the
//! remote API's partial-compilation behavior. Rendering is pure string
//! substitution: no conditionals, loops, or escaping rules.

use crate::prompt::{ChatMessage, PromptBody, PromptDocument};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex"));

/// A prompt body after variable substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledPrompt {
    Text(String),
    Chat(Vec<ChatMessage>),
}

/// Substitute `{{variable}}` placeholders in a single template string.
pub fn render(template: &str, variables: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match variables.get(name) {
                Some(value) => value.clone(),
                // Unknown placeholder: keep the original token verbatim.
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

impl PromptDocument {
    /// Compile this document's body with the given variables.
    pub fn compile(&self, variables: &HashMap<String, String>) -> CompiledPrompt {
        match &self.body {
            PromptBody::Text(template) => CompiledPrompt::Text(render(template, variables)),
            PromptBody::Chat(messages) => CompiledPrompt::Chat(
                messages
                    .iter()
                    .map(|m| ChatMessage::new(m.role.clone(), render(&m.content, variables)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_variable() {
        let out = render("Hello {{name}}!", &vars(&[("name", "Ada")]));
        assert_eq!(out, "Hello Ada!");
    }

    #[test]
    fn test_render_tolerates_inner_whitespace() {
        let out = render("Hello {{ name }}!", &vars(&[("name", "Ada")]));
        assert_eq!(out, "Hello Ada!");
    }

    #[test]
    fn test_render_leaves_unknown_placeholder_intact() {
        let out = render("Hello {{name}}, {{greeting}}", &vars(&[("name", "Ada")]));
        assert_eq!(out, "Hello Ada, {{greeting}}");
    }

    #[test]
    fn test_render_repeated_placeholder() {
        let out = render("{{x}} and {{x}}", &vars(&[("x", "two")]));
        assert_eq!(out, "two and two");
    }

    #[test]
    fn test_render_no_placeholders() {
        let out = render("static text", &vars(&[("unused", "v")]));
        assert_eq!(out, "static text");
    }

    #[test]
    fn test_compile_text_document() {
        let doc = PromptDocument::text("greeting", 1, "Hello {{name}}!");
        let compiled = doc.compile(&vars(&[("name", "Ada")]));
        assert_eq!(compiled, CompiledPrompt::Text("Hello Ada!".to_string()));
    }

    #[test]
    fn test_compile_chat_document() {
        let doc = PromptDocument::chat(
            "support",
            1,
            vec![
                ChatMessage::new("system", "You are {{persona}}."),
                ChatMessage::new("user", "{{question}}"),
            ],
        );
        let compiled = doc.compile(&vars(&[("persona", "a librarian"), ("question", "Why?")]));
        assert_eq!(
            compiled,
            CompiledPrompt::Chat(vec![
                ChatMessage::new("system", "You are a librarian."),
                ChatMessage::new("user", "Why?"),
            ])
        );
    }

    #[test]
    fn test_compile_preserves_roles() {
        let doc = PromptDocument::chat("roles", 1, vec![ChatMessage::new("assistant", "ok")]);
        match doc.compile(&HashMap::new()) {
            CompiledPrompt::Chat(messages) => assert_eq!(messages[0].role, "assistant"),
            other => panic!("expected chat, got {:?}", other),
        }
    }
}
