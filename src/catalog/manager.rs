use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{CatalogStore, ModelDescriptor, ModelKey};
use crate::credentials::CredentialResolver;
use crate::debug;
use crate::discovery::DiscoveryOrchestrator;

/// Rows inserted per transactionish batch during a merge. Bounded so a big
/// first discovery cannot starve concurrent UI reads of the store.
const MERGE_BATCH: usize = 25;
const MERGE_BATCH_PAUSE: Duration = Duration::from_millis(10);

/// Owns the persisted model catalog.
///
/// The store is the single source of truth; everything cached around it is
/// derived. All entry points absorb failures: they return empty collections
/// or `false`, never errors.
pub(crate) struct CatalogManager {
    store: Arc<dyn CatalogStore>,
    orchestrator: Arc<DiscoveryOrchestrator>,
    resolver: Arc<CredentialResolver>,
    current_tx: watch::Sender<Option<ModelKey>>,
}

impl CatalogManager {
    pub(crate) async fn new(
        store: Arc<dyn CatalogStore>,
        orchestrator: Arc<DiscoveryOrchestrator>,
        resolver: Arc<CredentialResolver>,
    ) -> CatalogManager {
        let current = store.current().await;
        let (current_tx, _) = watch::channel(current);

        CatalogManager {
            store,
            orchestrator,
            resolver,
            current_tx,
        }
    }

    /// Change notification for the current model. The UI layer watches this
    /// to refresh bindings.
    pub(crate) fn subscribe_current(&self) -> watch::Receiver<Option<ModelKey>> {
        self.current_tx.subscribe()
    }

    /// Persisted models whose provider currently has a usable credential.
    /// Rows from unavailable providers stay persisted but are filtered from
    /// this default view.
    pub(crate) async fn get_models(&self) -> Vec<ModelDescriptor> {
        let rows = self.store.all().await;

        let providers: HashSet<String> = rows
            .iter()
            .map(|row| row.provider.trim().to_lowercase())
            .collect();

        // The async check serves a fresh cache entry without I/O and falls
        // through to the secret store on a cold cache, so keys stored by a
        // previous process are visible here.
        let mut availability: HashMap<String, bool> = HashMap::new();

        for provider in &providers {
            let usable = self.resolver.has_usable_credential(provider).await;

            availability.insert(provider.clone(), usable);
        }

        rows.into_iter()
            .filter(|row| {
                availability
                    .get(&row.provider.trim().to_lowercase())
                    .copied()
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Every persisted row, usable credential or not. Administrative view.
    pub(crate) async fn get_models_unfiltered(&self) -> Vec<ModelDescriptor> {
        self.store.all().await
    }

    pub(crate) async fn current(&self) -> Option<ModelKey> {
        self.store.current().await
    }

    /// Runs a full discovery sweep and persists the genuinely new rows.
    /// Returns how many were added. Inserts happen in bounded batches with
    /// short pauses; `cancel` is honored between batches.
    pub(crate) async fn discover_and_merge(&self, cancel: &CancellationToken) -> usize {
        // Concurrent sweeps are the main source of duplicate rows, so heal
        // before computing the set difference against existing keys.
        self.reconcile_duplicates().await;

        let discovered = self.orchestrator.discover_all().await;

        let existing: HashSet<ModelKey> =
            self.store.all().await.iter().map(|row| row.key()).collect();

        let fresh: Vec<ModelDescriptor> = discovered
            .into_iter()
            .filter(|model| !existing.contains(&model.key()))
            .collect();

        let mut added = 0;

        for batch in fresh.chunks(MERGE_BATCH) {
            if cancel.is_cancelled() {
                debug!("merge cancelled after {} rows", added);
                break;
            }

            for model in batch {
                if self.store.insert(model.clone()).await {
                    added += 1;
                }
            }

            tokio::time::sleep(MERGE_BATCH_PAUSE).await;
        }

        added
    }

    /// Marks a model current, inserting it first if it is not yet
    /// persisted. Selection counts as a use.
    pub(crate) async fn set_current(&self, provider: &str, model: &str) -> bool {
        let key = ModelKey::new(provider, model);

        let mut descriptor = match self.store.get(&key).await {
            Some(descriptor) => descriptor,
            None => {
                let descriptor = ModelDescriptor::new(provider, model);

                if !self.store.insert(descriptor.clone()).await {
                    return false;
                }

                descriptor
            }
        };

        descriptor.record_use();

        if !self.store.update(descriptor).await {
            return false;
        }

        if !self.store.set_current(&key).await {
            return false;
        }

        self.current_tx.send_replace(Some(key));

        true
    }

    /// Sets or clears the favorite flag.
    ///
    /// An unknown model triggers a targeted discovery for its provider; if
    /// it still does not surface, favoriting synthesizes a placeholder row
    /// rather than failing. The user's intent outranks data completeness.
    pub(crate) async fn set_favorite(&self, provider: &str, model: &str, favorite: bool) -> bool {
        let key = ModelKey::new(provider, model);

        if self.store.get(&key).await.is_none() {
            self.merge_targeted(provider).await;
        }

        match self.store.get(&key).await {
            Some(mut descriptor) => {
                descriptor.favorite = favorite;

                self.store.update(descriptor).await
            }
            None if favorite => {
                let mut placeholder = ModelDescriptor::new(provider, model);

                placeholder.favorite = true;

                self.store.insert(placeholder).await
            }
            // Nothing to unfavorite.
            None => false,
        }
    }

    async fn merge_targeted(&self, provider: &str) {
        let discovered = self
            .orchestrator
            .discover_for_providers(&[provider.to_string()])
            .await;

        let existing: HashSet<ModelKey> =
            self.store.all().await.iter().map(|row| row.key()).collect();

        for model in discovered {
            if !existing.contains(&model.key()) {
                self.store.insert(model).await;
            }
        }
    }

    /// Collapses duplicate rows sharing a natural key down to one. The
    /// survivor is the most recently used row; ties break on use count,
    /// then favorite status. Returns how many rows were removed.
    pub(crate) async fn reconcile_duplicates(&self) -> usize {
        let rows = self.store.all().await;

        let mut groups: HashMap<ModelKey, Vec<ModelDescriptor>> = HashMap::new();

        for row in rows {
            groups.entry(row.key()).or_default().push(row);
        }

        let mut removed = 0;

        for (key, mut group) in groups {
            if group.len() < 2 {
                continue;
            }

            group.sort_by(|a, b| {
                b.last_used
                    .cmp(&a.last_used)
                    .then(b.use_count.cmp(&a.use_count))
                    .then(b.favorite.cmp(&a.favorite))
            });

            let survivor = group.swap_remove(0);

            removed += self.store.delete(&key).await.saturating_sub(1);

            self.store.insert(survivor).await;
        }

        if removed > 0 {
            debug!("reconciled {} duplicate catalog rows", removed);
        }

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::store::MemoryCatalog;
    use crate::config::CacheConfig;
    use crate::discovery::static_list::StaticStrategy;
    use crate::discovery::StrategyRegistry;
    use crate::secrets::{MemoryStore, SecretStore};
    use chrono::{TimeZone, Utc};

    fn cache_config() -> CacheConfig {
        CacheConfig {
            discovery_ttl_secs: Some(600),
            availability_ttl_secs: Some(600),
            availability_grace_secs: Some(3600),
        }
    }

    async fn manager_with(
        strategies: Vec<StaticStrategy>,
        credentialed: &[&str],
    ) -> CatalogManager {
        let secret_store = Arc::new(MemoryStore::new());

        for provider in credentialed {
            secret_store
                .set(
                    &crate::credentials::provider_key_name(provider),
                    "gsk_AbCdEfGhIjKlMnOpQrStUvWx",
                )
                .await;
        }

        let resolver = Arc::new(CredentialResolver::new(secret_store, &cache_config()));

        let mut registry = StrategyRegistry::new();

        for strategy in strategies {
            registry.register(Arc::new(strategy));
        }

        let orchestrator = Arc::new(DiscoveryOrchestrator::new(
            registry,
            resolver.clone(),
            &cache_config(),
        ));

        CatalogManager::new(Arc::new(MemoryCatalog::new()), orchestrator, resolver).await
    }

    fn groq_models(names: &[&str]) -> Vec<ModelDescriptor> {
        names
            .iter()
            .map(|name| ModelDescriptor::new("groq", name))
            .collect()
    }

    #[tokio::test]
    async fn merge_is_idempotent() {
        let manager = manager_with(
            vec![StaticStrategy::new(
                "groq",
                groq_models(&["llama3", "mixtral"]),
            )],
            &["groq"],
        )
        .await;

        let cancel = CancellationToken::new();

        assert_eq!(manager.discover_and_merge(&cancel).await, 2);
        assert_eq!(manager.discover_and_merge(&cancel).await, 0);
        assert_eq!(manager.get_models_unfiltered().await.len(), 2);
    }

    #[tokio::test]
    async fn cancelled_merge_adds_nothing() {
        let manager = manager_with(
            vec![StaticStrategy::new("groq", groq_models(&["llama3"]))],
            &["groq"],
        )
        .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(manager.discover_and_merge(&cancel).await, 0);
        assert!(manager.get_models_unfiltered().await.is_empty());
    }

    #[tokio::test]
    async fn reconcile_collapses_case_variant_duplicates() {
        let manager = manager_with(Vec::new(), &[]).await;

        let mut stale = ModelDescriptor::new("Groq", "Llama3");
        stale.last_used = Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());

        let mut recent = ModelDescriptor::new("groq", " llama3 ");
        recent.last_used = Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap());
        recent.use_count = 4;

        manager.store.insert(stale).await;
        manager.store.insert(recent).await;

        assert_eq!(manager.reconcile_duplicates().await, 1);

        let rows = manager.get_models_unfiltered().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].use_count, 4);
    }

    #[tokio::test]
    async fn reconcile_breaks_ties_by_use_count_then_favorite() {
        let manager = manager_with(Vec::new(), &[]).await;

        let mut favorite = ModelDescriptor::new("groq", "llama3");
        favorite.favorite = true;

        let plain = ModelDescriptor::new("GROQ", "llama3");

        manager.store.insert(plain).await;
        manager.store.insert(favorite).await;

        assert_eq!(manager.reconcile_duplicates().await, 1);

        let rows = manager.get_models_unfiltered().await;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].favorite);
    }

    #[tokio::test]
    async fn favoriting_an_undiscovered_model_creates_a_placeholder() {
        // Discovery for groq is registered but yields nothing.
        let manager = manager_with(
            vec![StaticStrategy::new("groq", Vec::new())],
            &["groq"],
        )
        .await;

        assert!(manager.set_favorite("Groq", "unknown-model", true).await);

        let rows = manager.get_models_unfiltered().await;

        assert_eq!(rows.len(), 1);
        assert!(rows[0].favorite);
        assert!(rows[0].available);
        assert_eq!(rows[0].max_tokens, 4096);
        assert_eq!(rows[0].max_context, 8192);
    }

    #[tokio::test]
    async fn favoriting_prefers_a_targeted_discovery_hit() {
        let mut discovered = ModelDescriptor::new("groq", "llama3");
        discovered.max_context = 131072;

        let manager = manager_with(
            vec![StaticStrategy::new("groq", vec![discovered])],
            &["groq"],
        )
        .await;

        assert!(manager.set_favorite("groq", "llama3", true).await);

        let rows = manager.get_models_unfiltered().await;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].max_context, 131072);
        assert!(rows[0].favorite);
    }

    #[tokio::test]
    async fn unfavoriting_an_unknown_model_is_a_no_op() {
        let manager = manager_with(Vec::new(), &[]).await;

        assert!(!manager.set_favorite("groq", "nope", false).await);
        assert!(manager.get_models_unfiltered().await.is_empty());
    }

    #[tokio::test]
    async fn set_current_inserts_records_usage_and_notifies() {
        let manager = manager_with(Vec::new(), &[]).await;

        let subscription = manager.subscribe_current();
        assert_eq!(*subscription.borrow(), None);

        assert!(manager.set_current("groq", "llama3").await);

        assert_eq!(
            *subscription.borrow(),
            Some(ModelKey::new("groq", "llama3"))
        );
        assert_eq!(manager.current().await, Some(ModelKey::new("groq", "llama3")));

        let rows = manager.get_models_unfiltered().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].use_count, 1);
        assert!(rows[0].last_used.is_some());
    }

    #[tokio::test]
    async fn models_without_credentials_are_filtered_from_the_default_view() {
        let manager = manager_with(Vec::new(), &["groq"]).await;

        manager.store.insert(ModelDescriptor::new("groq", "llama3")).await;
        manager
            .store
            .insert(ModelDescriptor::new("mistral", "mistral-large"))
            .await;

        let visible = manager.get_models().await;

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].provider, "groq");

        assert_eq!(manager.get_models_unfiltered().await.len(), 2);
    }

    #[tokio::test]
    async fn stored_keys_are_visible_without_cache_priming() {
        // A fresh process: the availability cache is empty and the only
        // credential lives in the secret store.
        let manager = manager_with(Vec::new(), &["groq"]).await;

        manager.store.insert(ModelDescriptor::new("groq", "llama3")).await;

        let visible = manager.get_models().await;

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].provider, "groq");
    }
}
