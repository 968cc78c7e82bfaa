//! Cache key construction for prompt lookups.
//!
//! A prompt is addressed by name plus at most one discriminator: a numeric
//! version or a deployment label. The discriminator is an enum, so a key
//! carrying both a version and a label is unrepresentable - the mutual
//! exclusion is enforced by construction, not by runtime validation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which revision of a named prompt a lookup refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PromptSelector {
    /// The latest revision the remote API serves by default.
    #[default]
    Latest,
    /// A pinned numeric version.
    Version(u32),
    /// A deployment label such as `production` or `staging`.
    Label(String),
}

/// A fully-addressed prompt lookup key.
///
/// Renders deterministically to the string form used by every cache layer:
/// `name`, `name:v<version>`, or `name:<label>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromptKey {
    name: String,
    selector: PromptSelector,
}

impl PromptKey {
    /// Key for the latest revision of `name`.
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: PromptSelector::Latest,
        }
    }

    /// Key for a pinned version of `name`.
    pub fn version(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            selector: PromptSelector::Version(version),
        }
    }

    /// Key for a labeled deployment of `name`.
    pub fn label(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: PromptSelector::Label(label.into()),
        }
    }

    /// The prompt name without any discriminator.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The revision discriminator.
    pub fn selector(&self) -> &PromptSelector {
        &self.selector
    }

    /// Render the deterministic cache key string.
    pub fn cache_key(&self) -> String {
        match &self.selector {
            PromptSelector::Latest => self.name.clone(),
            PromptSelector::Version(v) => format!("{}:v{}", self.name, v),
            PromptSelector::Label(label) => format!("{}:{}", self.name, label),
        }
    }

    /// Prefix shared by every key of the same prompt family, for bulk
    /// invalidation via prefix deletes.
    pub fn family_prefix(name: &str) -> String {
        format!("{}:", name)
    }
}

impl fmt::Display for PromptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn name_strategy() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,24}"
    }

    fn selector_strategy() -> impl Strategy<Value = PromptSelector> {
        prop_oneof![
            Just(PromptSelector::Latest),
            any::<u32>().prop_map(PromptSelector::Version),
            "[a-z][a-z0-9_-]{0,16}".prop_map(PromptSelector::Label),
        ]
    }

    proptest! {
        /// Rendering is deterministic: the same key always produces the same
        /// string.
        #[test]
        fn prop_rendering_is_deterministic(
            name in name_strategy(),
            selector in selector_strategy(),
        ) {
            let key = PromptKey {
                name: name.clone(),
                selector: selector.clone(),
            };
            prop_assert_eq!(key.cache_key(), key.cache_key());
        }

        /// Discriminated keys always extend the bare name with a `:` segment,
        /// so per-family prefix invalidation can never miss them.
        #[test]
        fn prop_discriminated_keys_share_family_prefix(
            name in name_strategy(),
            version in any::<u32>(),
            label in "[a-z][a-z0-9_-]{0,16}",
        ) {
            let prefix = PromptKey::family_prefix(&name);
            prop_assert!(PromptKey::version(name.clone(), version)
                .cache_key()
                .starts_with(&prefix));
            prop_assert!(PromptKey::label(name.clone(), label)
                .cache_key()
                .starts_with(&prefix));
        }

        /// Keys with different versions never collide for the same name.
        #[test]
        fn prop_versions_do_not_collide(
            name in name_strategy(),
            v1 in any::<u32>(),
            v2 in any::<u32>(),
        ) {
            prop_assume!(v1 != v2);
            prop_assert_ne!(
                PromptKey::version(name.clone(), v1).cache_key(),
                PromptKey::version(name, v2).cache_key()
            );
        }
    }
}
