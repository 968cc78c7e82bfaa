//! Prompt document types.
//!
//! These are the payloads the cache layer carries: a versioned prompt as the
//! remote management API serves it, with its body, deployment labels, and any
//! model configuration attached server-side.

use serde::{Deserialize, Serialize};

/// A single message in a chat-style prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// The template body of a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "template", rename_all = "snake_case")]
pub enum PromptBody {
    /// A single text template.
    Text(String),
    /// An ordered list of chat message templates.
    Chat(Vec<ChatMessage>),
}

/// A versioned prompt document as served by the remote management API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDocument {
    /// Logical prompt name, unique within a project.
    pub name: String,
    /// Monotonically increasing revision number.
    pub version: u32,
    /// Deployment labels currently pointing at this revision.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Free-form organizational tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// The template body.
    pub body: PromptBody,
    /// Model configuration attached to the prompt server-side
    /// (temperature, model name, and similar pass-through settings).
    #[serde(default)]
    pub config: serde_json::Value,
}

impl PromptDocument {
    /// Create a text prompt document with no labels, tags, or config.
    pub fn text(name: impl Into<String>, version: u32, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            labels: Vec::new(),
            tags: Vec::new(),
            body: PromptBody::Text(template.into()),
            config: serde_json::Value::Null,
        }
    }

    /// Create a chat prompt document with no labels, tags, or config.
    pub fn chat(name: impl Into<String>, version: u32, messages: Vec<ChatMessage>) -> Self {
        Self {
            name: name.into(),
            version,
            labels: Vec::new(),
            tags: Vec::new(),
            body: PromptBody::Chat(messages),
            config: serde_json::Value::Null,
        }
    }

    /// Whether a deployment label points at this revision.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}
