//! Credential resolution and availability caching.
//!
//! A credential is a secret string usable to call one provider. Secrets are
//! looked up through a priority chain (model-specific stored secret,
//! provider-level stored secret, then the process environment under the same
//! names) and cached, negative results included, so UI-driven callers do not
//! hammer the secret store.
//!
//! ## Key naming
//!
//! Lookup names follow a fixed convention shared with the environment:
//!
//! - provider level: `AI_KEY_<PROVIDER_UPPER>`
//! - model specific: `AI_KEY_<PROVIDER_UPPER>_<MODEL_NORMALIZED_UPPER>`
//!
//! where normalization folds `-` and `/` to `_`. The convention is part of
//! the external contract and must not change.
//!
//! ## Validity
//!
//! "Usable" means the secret exists and matches a format check (minimum
//! length plus a provider-specific pattern when one is known). Validation is
//! format-only; no network call is ever made here.

pub(crate) mod format;
pub(crate) mod resolver;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) use resolver::CredentialResolver;

pub(crate) const KEY_PREFIX: &str = "AI_KEY_";

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum CredentialSource {
    Environment,
    SecureStore,
    UserEntered,
}

/// A resolved credential. Cache-bound; the canonical value lives in the
/// secret store or the environment. Usage counters are shared between
/// clones, so the cached copy and the copies handed to callers agree.
#[derive(Debug, Clone)]
pub(crate) struct CredentialRecord {
    pub secret: String,
    pub source: CredentialSource,
    pub created: Instant,
    usage: Arc<RecordUsage>,
}

#[derive(Debug, Default)]
struct RecordUsage {
    count: AtomicU64,
    /// Milliseconds after `created`. An `Instant` cannot be stored
    /// atomically.
    last_used_ms: AtomicU64,
}

impl CredentialRecord {
    pub(crate) fn new(secret: String, source: CredentialSource) -> CredentialRecord {
        CredentialRecord {
            secret,
            source,
            created: Instant::now(),
            usage: Arc::new(RecordUsage::default()),
        }
    }

    /// Records one use. Takes `&self` so cache hits can bump the counters
    /// without holding a write lock.
    pub(crate) fn touch(&self) {
        self.usage.count.fetch_add(1, Ordering::Relaxed);
        self.usage
            .last_used_ms
            .store(self.created.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    pub(crate) fn use_count(&self) -> u64 {
        self.usage.count.load(Ordering::Relaxed)
    }

    pub(crate) fn last_used(&self) -> Instant {
        self.created + Duration::from_millis(self.usage.last_used_ms.load(Ordering::Relaxed))
    }
}

fn normalize_segment(segment: &str) -> String {
    segment.trim().to_uppercase().replace(['-', '/'], "_")
}

/// Provider-level lookup name: `AI_KEY_<PROVIDER_UPPER>`.
pub(crate) fn provider_key_name(provider: &str) -> String {
    format!("{}{}", KEY_PREFIX, provider.trim().to_uppercase())
}

/// Model-specific lookup name:
/// `AI_KEY_<PROVIDER_UPPER>_<MODEL_NORMALIZED_UPPER>`.
pub(crate) fn model_key_name(provider: &str, model: &str) -> String {
    format!(
        "{}{}_{}",
        KEY_PREFIX,
        provider.trim().to_uppercase(),
        normalize_segment(model)
    )
}

/// Composite cache key for a (provider, optional model) resolution.
pub(crate) fn cache_key(provider: &str, model: Option<&str>) -> String {
    let provider = provider.trim().to_lowercase();

    match model {
        Some(model) => format!("{}:{}", provider, model.trim().to_lowercase()),
        None => provider,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_key_follows_convention() {
        assert_eq!(provider_key_name("OpenRouter"), "AI_KEY_OPENROUTER");
        assert_eq!(provider_key_name(" groq "), "AI_KEY_GROQ");
    }

    #[test]
    fn model_key_folds_separators() {
        assert_eq!(
            model_key_name("openrouter", "meta/llama-3-70b"),
            "AI_KEY_OPENROUTER_META_LLAMA_3_70B"
        );
        assert_eq!(model_key_name("Groq", "llama3"), "AI_KEY_GROQ_LLAMA3");
    }

    #[test]
    fn cache_keys_are_lowercased() {
        assert_eq!(cache_key("Groq", None), "groq");
        assert_eq!(cache_key("Groq", Some(" Llama3 ")), "groq:llama3");
    }

    #[test]
    fn touch_tracks_usage_across_clones() {
        let record = CredentialRecord::new("secret".to_string(), CredentialSource::SecureStore);
        let clone = record.clone();

        record.touch();
        clone.touch();

        assert_eq!(record.use_count(), 2);
        assert_eq!(clone.use_count(), 2);
        assert!(record.last_used() >= record.created);
    }
}
