//! The persisted model catalog.
//!
//! A catalog row is a [`ModelDescriptor`]: one model offered by one provider,
//! plus its capability flags, limits, and usage statistics. Rows are
//! identified by the natural key `(provider, model)`, compared
//! case-insensitively and whitespace-trimmed ([`ModelKey`]).
//!
//! The store is a plain row store: it does not enforce key uniqueness, since
//! concurrent discovery runs can race their inserts. The
//! [`manager::CatalogManager`] reconciles duplicates after the fact.

pub(crate) mod manager;
pub(crate) mod store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub(crate) use manager::CatalogManager;

/// The case-insensitive natural key of a catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct ModelKey {
    provider: String,
    model: String,
}

impl ModelKey {
    pub(crate) fn new(provider: &str, model: &str) -> ModelKey {
        ModelKey {
            provider: provider.trim().to_lowercase(),
            model: model.trim().to_lowercase(),
        }
    }

    /// Parses a `provider/model` spec. The model part may itself contain
    /// slashes (e.g. `openrouter/meta/llama-3-70b`), so only the first
    /// separator splits.
    pub(crate) fn parse(spec: &str) -> Option<ModelKey> {
        let (provider, model) = spec.split_once('/')?;

        if provider.trim().is_empty() || model.trim().is_empty() {
            return None;
        }

        Some(ModelKey::new(provider, model))
    }

    pub(crate) fn provider(&self) -> &str {
        &self.provider
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// What a model can do. Flags default to off; discovery strategies set what
/// they know.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct Capabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default)]
    pub function_calling: bool,
}

pub(crate) const DEFAULT_MAX_TOKENS: u32 = 4096;
pub(crate) const DEFAULT_MAX_CONTEXT: u32 = 8192;
pub(crate) const DEFAULT_TEMPERATURE: f32 = 1.0;

/// One catalog row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ModelDescriptor {
    pub provider: String,
    pub model: String,
    pub display_name: String,
    #[serde(default)]
    pub capabilities: Capabilities,
    pub max_tokens: u32,
    pub max_context: u32,
    pub temperature: f32,
    #[serde(default)]
    pub use_count: u64,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub available: bool,
}

impl ModelDescriptor {
    pub(crate) fn new(provider: &str, model: &str) -> ModelDescriptor {
        ModelDescriptor {
            provider: provider.trim().to_string(),
            model: model.trim().to_string(),
            display_name: model.trim().to_string(),
            capabilities: Capabilities::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_context: DEFAULT_MAX_CONTEXT,
            temperature: DEFAULT_TEMPERATURE,
            use_count: 0,
            last_used: None,
            favorite: false,
            default: false,
            available: true,
        }
    }

    pub(crate) fn key(&self) -> ModelKey {
        ModelKey::new(&self.provider, &self.model)
    }

    pub(crate) fn record_use(&mut self) {
        self.use_count += 1;
        self.last_used = Some(Utc::now());
    }
}

/// Async CRUD over catalog rows, keyed by [`ModelKey`].
///
/// `insert` appends without a uniqueness check; `delete` removes every row
/// matching the key. The current-model pointer is a separate single-row
/// operation.
#[async_trait]
pub(crate) trait CatalogStore: Send + Sync {
    async fn all(&self) -> Vec<ModelDescriptor>;

    /// First row matching `key`, if any.
    async fn get(&self, key: &ModelKey) -> Option<ModelDescriptor>;

    async fn insert(&self, descriptor: ModelDescriptor) -> bool;

    /// Replaces the first row matching the descriptor's key. Returns false
    /// if no row matched or the write failed.
    async fn update(&self, descriptor: ModelDescriptor) -> bool;

    /// Removes every row matching `key`, returning how many were removed.
    async fn delete(&self, key: &ModelKey) -> usize;

    async fn current(&self) -> Option<ModelKey>;

    async fn set_current(&self, key: &ModelKey) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_normalize_case_and_whitespace() {
        assert_eq!(ModelKey::new("Groq", "Llama3"), ModelKey::new("groq", " llama3 "));
    }

    #[test]
    fn parse_splits_on_the_first_slash_only() {
        let key = ModelKey::parse("openrouter/meta/llama-3-70b").unwrap();

        assert_eq!(key.provider(), "openrouter");
        assert_eq!(key.model(), "meta/llama-3-70b");

        assert!(ModelKey::parse("no-separator").is_none());
        assert!(ModelKey::parse("/model").is_none());
    }

    #[test]
    fn new_descriptor_carries_placeholder_limits() {
        let descriptor = ModelDescriptor::new("groq", "llama3");

        assert_eq!(descriptor.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(descriptor.max_context, DEFAULT_MAX_CONTEXT);
        assert!(descriptor.available);
        assert!(!descriptor.favorite);
    }
}
