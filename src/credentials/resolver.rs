use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::format::is_plausible_key;
use super::{
    cache_key, model_key_name, provider_key_name, CredentialRecord, CredentialSource,
};
use crate::config::CacheConfig;
use crate::debug;
use crate::secrets::SecretStore;
use crate::utils::cache::CacheEntry;

struct Caches {
    /// Keyed by lower-cased provider name.
    availability: HashMap<String, CacheEntry<bool>>,
    /// Keyed by [`cache_key`]. Negative resolutions are cached too, so a
    /// provider with no key does not hit the store on every render.
    resolved: HashMap<String, CacheEntry<Option<CredentialRecord>>>,
}

/// Resolves and caches credentials for providers.
///
/// One instance is shared by the discovery orchestrator and the catalog
/// manager. The cache maps are guarded by a single `RwLock`; cache hits
/// take only the read side, and secret-store and environment reads always
/// happen outside of it, so a slow keychain cannot serialize lookups for
/// unrelated providers.
pub(crate) struct CredentialResolver {
    store: Arc<dyn SecretStore>,
    availability_ttl: Duration,
    availability_grace: Duration,
    caches: RwLock<Caches>,
}

impl CredentialResolver {
    pub(crate) fn new(store: Arc<dyn SecretStore>, cache: &CacheConfig) -> CredentialResolver {
        CredentialResolver {
            store,
            availability_ttl: cache.availability_ttl(),
            availability_grace: cache.availability_grace(),
            caches: RwLock::new(Caches {
                availability: HashMap::new(),
                resolved: HashMap::new(),
            }),
        }
    }

    fn env_secret(name: &str) -> Option<String> {
        match std::env::var(name) {
            Ok(value) if !value.trim().is_empty() => Some(value),
            _ => None,
        }
    }

    /// Resolves a credential for `provider`, preferring a model-specific
    /// secret when `model` is given.
    ///
    /// Chain, first non-empty hit wins: model-specific stored secret,
    /// provider-level stored secret, then the environment under the same
    /// two names (model identifiers are normalized into the name, so the
    /// separator-folded variant is covered by construction). The outcome,
    /// including a miss, is cached for the availability TTL.
    pub(crate) async fn resolve(
        &self,
        provider: &str,
        model: Option<&str>,
    ) -> Option<CredentialRecord> {
        let key = cache_key(provider, model);

        {
            let caches = self.caches.read().unwrap();

            if let Some(entry) = caches.resolved.get(&key) {
                if entry.fresh(self.availability_ttl) {
                    debug!("credential cache hit for \"{}\"", key);

                    // Usage counters are atomic, so a hit stays on the
                    // read side of the lock.
                    if let Some(record) = entry.value() {
                        record.touch();
                    }

                    return entry.value().clone();
                }
            }
        }

        let record = self.resolve_uncached(provider, model).await;

        let mut caches = self.caches.write().unwrap();

        caches
            .resolved
            .insert(key, CacheEntry::new(record.clone()));

        record
    }

    async fn resolve_uncached(
        &self,
        provider: &str,
        model: Option<&str>,
    ) -> Option<CredentialRecord> {
        let provider_name = provider_key_name(provider);
        let model_name = model.map(|m| model_key_name(provider, m));

        if let Some(name) = &model_name {
            if let Some(secret) = self.store.get(name).await {
                if !secret.trim().is_empty() {
                    return Some(CredentialRecord::new(secret, CredentialSource::SecureStore));
                }
            }
        }

        if let Some(secret) = self.store.get(&provider_name).await {
            if !secret.trim().is_empty() {
                return Some(CredentialRecord::new(secret, CredentialSource::SecureStore));
            }
        }

        if let Some(name) = &model_name {
            if let Some(secret) = Self::env_secret(name) {
                return Some(CredentialRecord::new(secret, CredentialSource::Environment));
            }
        }

        if let Some(secret) = Self::env_secret(&provider_name) {
            return Some(CredentialRecord::new(secret, CredentialSource::Environment));
        }

        debug!("no credential resolved for \"{}\"", cache_key(provider, model));

        None
    }

    /// Whether `provider` currently has a usable credential. Misses and
    /// expired entries trigger a full resolve plus format validation.
    pub(crate) async fn has_usable_credential(&self, provider: &str) -> bool {
        let key = cache_key(provider, None);

        {
            let caches = self.caches.read().unwrap();

            if let Some(entry) = caches.availability.get(&key) {
                if entry.fresh(self.availability_ttl) {
                    return *entry.value();
                }
            }
        }

        let usable = match self.resolve(provider, None).await {
            Some(record) => is_plausible_key(provider, &record.secret),
            None => false,
        };

        let mut caches = self.caches.write().unwrap();

        caches.availability.insert(key, CacheEntry::new(usable));

        usable
    }

    /// Non-blocking availability read for callers that cannot await.
    ///
    /// Trusts a cached entry up to the grace window even after the strict
    /// TTL has lapsed. With nothing cached it falls back to a direct
    /// environment read; it never touches the secure store, and the
    /// fallback result is deliberately not cached (it would shadow a
    /// stored secret the async path can see).
    pub(crate) fn has_usable_credential_cached(&self, provider: &str) -> bool {
        let key = cache_key(provider, None);

        {
            let caches = self.caches.read().unwrap();

            if let Some(entry) = caches.availability.get(&key) {
                if entry.fresh(self.availability_grace) {
                    return *entry.value();
                }
            }
        }

        match Self::env_secret(&provider_key_name(provider)) {
            Some(secret) => is_plausible_key(provider, &secret),
            None => false,
        }
    }

    /// Availability for several providers at once. Implemented as repeated
    /// cached lookups rather than one batched store call; callers that need
    /// authoritative answers should have run the async check first.
    pub(crate) fn availability_batch(
        &self,
        providers: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> HashMap<String, bool> {
        let mut map = HashMap::new();

        for provider in providers {
            let provider = provider.as_ref();

            map.insert(
                cache_key(provider, None),
                self.has_usable_credential_cached(provider),
            );
        }

        map
    }

    /// Stores a provider-level secret, then updates the availability cache
    /// in place so the very next check reflects it without a TTL wait.
    pub(crate) async fn save(&self, provider: &str, secret: &str) -> bool {
        let stored = self.store.set(&provider_key_name(provider), secret).await;

        if stored {
            self.apply_saved(provider, None, secret);
        }

        stored
    }

    /// Stores a model-specific secret under the normalized name.
    pub(crate) async fn save_for_model(&self, provider: &str, model: &str, secret: &str) -> bool {
        let stored = self
            .store
            .set(&model_key_name(provider, model), secret)
            .await;

        if stored {
            self.apply_saved(provider, Some(model), secret);
        }

        stored
    }

    fn apply_saved(&self, provider: &str, model: Option<&str>, secret: &str) {
        let usable = is_plausible_key(provider, secret);

        let mut caches = self.caches.write().unwrap();

        caches
            .availability
            .insert(cache_key(provider, None), CacheEntry::new(usable));

        Self::invalidate_resolved(&mut caches, provider);

        // The user just handed us this value; cache it as resolved so the
        // next call does not round-trip through the store.
        caches.resolved.insert(
            cache_key(provider, model),
            CacheEntry::new(Some(CredentialRecord::new(
                secret.to_string(),
                CredentialSource::UserEntered,
            ))),
        );
    }

    /// Deletes the provider-level secret and marks the provider unavailable
    /// immediately.
    pub(crate) async fn delete(&self, provider: &str) -> bool {
        let deleted = self.store.delete(&provider_key_name(provider)).await;

        if deleted {
            let key = cache_key(provider, None);

            let mut caches = self.caches.write().unwrap();

            caches.availability.insert(key, CacheEntry::new(false));

            Self::invalidate_resolved(&mut caches, provider);
        }

        deleted
    }

    fn invalidate_resolved(caches: &mut Caches, provider: &str) {
        let plain = cache_key(provider, None);
        let prefix = format!("{}:", plain);

        caches
            .resolved
            .retain(|key, _| *key != plain && !key.starts_with(&prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn short_cache() -> CacheConfig {
        CacheConfig {
            discovery_ttl_secs: Some(600),
            availability_ttl_secs: Some(600),
            availability_grace_secs: Some(3600),
        }
    }

    fn resolver_with(store: Arc<dyn SecretStore>) -> CredentialResolver {
        CredentialResolver::new(store, &short_cache())
    }

    /// Counts reads so tests can observe whether the cache absorbed them.
    struct CountingStore {
        inner: MemoryStore,
        reads: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> CountingStore {
            CountingStore {
                inner: MemoryStore::new(),
                reads: AtomicUsize::new(0),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SecretStore for CountingStore {
        async fn get(&self, name: &str) -> Option<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(name).await
        }

        async fn set(&self, name: &str, value: &str) -> bool {
            self.inner.set(name, value).await
        }

        async fn delete(&self, name: &str) -> bool {
            self.inner.delete(name).await
        }
    }

    #[tokio::test]
    async fn unconfigured_provider_resolves_to_none() {
        let resolver = resolver_with(Arc::new(MemoryStore::new()));

        assert!(resolver.resolve("no-such-vendor", None).await.is_none());
        assert!(!resolver.has_usable_credential("no-such-vendor").await);
    }

    #[tokio::test]
    async fn model_specific_secret_wins_over_provider_level() {
        let store = Arc::new(MemoryStore::new());

        store.set("AI_KEY_GROQ", "gsk_ProviderLevelSecret0001").await;
        store
            .set("AI_KEY_GROQ_LLAMA3", "gsk_ModelLevelSecret000001")
            .await;

        let resolver = resolver_with(store);

        let record = resolver.resolve("Groq", Some("llama3")).await.unwrap();
        assert_eq!(record.secret, "gsk_ModelLevelSecret000001");
        assert_eq!(record.source, CredentialSource::SecureStore);

        let record = resolver.resolve("Groq", None).await.unwrap();
        assert_eq!(record.secret, "gsk_ProviderLevelSecret0001");
    }

    #[tokio::test]
    async fn cache_hits_count_as_uses() {
        let store = Arc::new(MemoryStore::new());

        store.set("AI_KEY_GROQ", "gsk_AbCdEfGhIjKlMnOpQrStUvWx").await;

        let resolver = resolver_with(store);

        let first = resolver.resolve("groq", None).await.unwrap();
        assert_eq!(first.use_count(), 0);

        // The second resolve hits the cache and touches the shared record.
        resolver.resolve("groq", None).await;
        assert_eq!(first.use_count(), 1);
    }

    #[tokio::test]
    async fn negative_results_are_cached() {
        let store = Arc::new(CountingStore::new());
        let resolver = resolver_with(store.clone());

        assert!(resolver.resolve("mistral", None).await.is_none());
        let after_first = store.reads();
        assert!(after_first > 0);

        assert!(resolver.resolve("mistral", None).await.is_none());
        assert_eq!(store.reads(), after_first);
    }

    #[tokio::test]
    async fn expired_availability_triggers_a_fresh_resolve() {
        let store = Arc::new(CountingStore::new());
        let cache = CacheConfig {
            discovery_ttl_secs: Some(600),
            availability_ttl_secs: Some(0),
            availability_grace_secs: Some(0),
        };
        let resolver = CredentialResolver::new(store.clone(), &cache);

        assert!(!resolver.has_usable_credential("mistral").await);
        let after_first = store.reads();

        assert!(!resolver.has_usable_credential("mistral").await);
        assert!(store.reads() > after_first);
    }

    #[tokio::test]
    async fn save_updates_availability_without_ttl_wait() {
        let resolver = resolver_with(Arc::new(MemoryStore::new()));

        assert!(!resolver.has_usable_credential("OpenRouter").await);

        assert!(
            resolver
                .save("OpenRouter", "sk-or-AbCdEfGhIjKlMnOpQrStUvWx")
                .await
        );

        // No TTL wait: the cache was updated in place by save().
        assert!(resolver.has_usable_credential("OpenRouter").await);
        assert!(resolver.has_usable_credential_cached("OpenRouter"));

        // The saved value is served from the resolved cache directly.
        let record = resolver.resolve("OpenRouter", None).await.unwrap();
        assert_eq!(record.source, CredentialSource::UserEntered);
    }

    #[tokio::test]
    async fn save_of_implausible_secret_marks_provider_unavailable() {
        let resolver = resolver_with(Arc::new(MemoryStore::new()));

        assert!(resolver.save("groq", "short").await);
        assert!(!resolver.has_usable_credential_cached("groq"));
    }

    #[tokio::test]
    async fn delete_marks_provider_unavailable_immediately() {
        let store = Arc::new(MemoryStore::new());
        let resolver = resolver_with(store);

        assert!(
            resolver
                .save("groq", "gsk_AbCdEfGhIjKlMnOpQrStUvWx")
                .await
        );
        assert!(resolver.has_usable_credential("groq").await);

        assert!(resolver.delete("groq").await);
        assert!(!resolver.has_usable_credential("groq").await);
        assert!(!resolver.has_usable_credential_cached("groq"));
    }

    #[tokio::test]
    async fn save_invalidates_stale_resolved_entries() {
        let store = Arc::new(MemoryStore::new());
        let resolver = resolver_with(store);

        // Populate a cached negative result, then save a key over it.
        assert!(resolver.resolve("groq", Some("llama3")).await.is_none());
        assert!(
            resolver
                .save("groq", "gsk_AbCdEfGhIjKlMnOpQrStUvWx")
                .await
        );

        let record = resolver.resolve("groq", Some("llama3")).await.unwrap();
        assert_eq!(record.secret, "gsk_AbCdEfGhIjKlMnOpQrStUvWx");
    }

    #[tokio::test]
    async fn environment_is_consulted_after_the_store() {
        // Process-global environment: the variable name is unique to this
        // test to keep parallel test runs independent.
        std::env::set_var("AI_KEY_ZEBRACORP", "zebra-environment-key-01");

        let resolver = resolver_with(Arc::new(MemoryStore::new()));

        let record = resolver.resolve("ZebraCorp", None).await.unwrap();
        assert_eq!(record.source, CredentialSource::Environment);

        // The non-blocking path may also read the environment directly.
        assert!(resolver.has_usable_credential_cached("ZebraCorp"));

        std::env::remove_var("AI_KEY_ZEBRACORP");
    }

    #[tokio::test]
    async fn batch_reports_each_requested_provider() {
        let resolver = resolver_with(Arc::new(MemoryStore::new()));

        resolver
            .save("groq", "gsk_AbCdEfGhIjKlMnOpQrStUvWx")
            .await;

        let map = resolver.availability_batch(["groq", "mistral"]);

        assert_eq!(map.get("groq"), Some(&true));
        assert_eq!(map.get("mistral"), Some(&false));
    }
}
