use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;

use super::{ErrorKind, StrategyRegistry};
use crate::catalog::{ModelDescriptor, ModelKey};
use crate::config::CacheConfig;
use crate::credentials::CredentialResolver;
use crate::utils::cache::CacheEntry;
use crate::{debug, warn};

/// How long a waiter polls before re-checking a peer's in-flight discovery.
const IN_FLIGHT_POLL: Duration = Duration::from_millis(25);

/// Fans discovery out over the registered strategies.
///
/// Per provider, results live in a TTL cache: a fresh entry is served
/// without I/O, a stale or missing one triggers a credential check followed
/// by the strategy call. An in-flight set collapses concurrent fetches for
/// the same provider; waiters poll until the winner's result lands in the
/// cache. Full sweeps are additionally serialized by one process-wide lock.
pub(crate) struct DiscoveryOrchestrator {
    registry: StrategyRegistry,
    resolver: Arc<CredentialResolver>,
    ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry<Vec<ModelDescriptor>>>>,
    in_flight: Mutex<HashSet<String>>,
    sweep: tokio::sync::Mutex<()>,
}

struct InFlightGuard<'o> {
    orchestrator: &'o DiscoveryOrchestrator,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator
            .in_flight
            .lock()
            .unwrap()
            .remove(&self.key);
    }
}

impl DiscoveryOrchestrator {
    pub(crate) fn new(
        registry: StrategyRegistry,
        resolver: Arc<CredentialResolver>,
        cache: &CacheConfig,
    ) -> DiscoveryOrchestrator {
        DiscoveryOrchestrator {
            registry,
            resolver,
            ttl: cache.discovery_ttl(),
            cache: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            sweep: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) fn provider_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Discovers models for every registered provider. One full sweep runs
    /// at a time; within it, providers run concurrently and a failing
    /// provider contributes an empty list rather than aborting the rest.
    pub(crate) async fn discover_all(&self) -> Vec<ModelDescriptor> {
        let _sweep = self.sweep.lock().await;

        self.fan_out(self.registry.names()).await
    }

    /// Like [`discover_all`](Self::discover_all) but scoped to a subset.
    /// Does not take the full-sweep lock; the per-provider cache and
    /// in-flight set are the real safety boundary.
    pub(crate) async fn discover_for_providers(
        &self,
        providers: &[String],
    ) -> Vec<ModelDescriptor> {
        self.fan_out(providers.to_vec()).await
    }

    async fn fan_out(&self, providers: Vec<String>) -> Vec<ModelDescriptor> {
        let tasks = providers
            .iter()
            .map(|provider| self.discover_provider(provider));

        let results = join_all(tasks).await;

        dedupe(results.into_iter().flatten())
    }

    /// Discovers models for one provider, serving a fresh cache entry
    /// without I/O.
    pub(crate) async fn discover_provider(&self, provider: &str) -> Vec<ModelDescriptor> {
        let key = provider.trim().to_lowercase();

        loop {
            if let Some(models) = self.cached(&key) {
                debug!("discovery cache hit for \"{}\"", key);
                return models;
            }

            if let Some(guard) = self.claim(&key) {
                // Claim race: a peer may have finished between the cache
                // check and the claim.
                if let Some(models) = self.cached(&key) {
                    return models;
                }

                let models = self.fetch(provider).await;

                self.cache
                    .lock()
                    .unwrap()
                    .insert(key, CacheEntry::new(models.clone()));

                drop(guard);

                return models;
            }

            // A peer is already fetching this provider; its result will
            // land in the cache.
            tokio::time::sleep(IN_FLIGHT_POLL).await;
        }
    }

    fn cached(&self, key: &str) -> Option<Vec<ModelDescriptor>> {
        let cache = self.cache.lock().unwrap();

        match cache.get(key) {
            Some(entry) if entry.fresh(self.ttl) => Some(entry.value().clone()),
            _ => None,
        }
    }

    fn claim(&self, key: &str) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap();

        if in_flight.insert(key.to_string()) {
            Some(InFlightGuard {
                orchestrator: self,
                key: key.to_string(),
            })
        } else {
            None
        }
    }

    async fn fetch(&self, provider: &str) -> Vec<ModelDescriptor> {
        let Some(strategy) = self.registry.get(provider) else {
            // Not wired up yet. Expected for freshly-added provider names.
            debug!("no discovery strategy registered for \"{}\"", provider);
            return Vec::new();
        };

        if !self.resolver.has_usable_credential(provider).await {
            debug!("skipping discovery for \"{}\": no usable credential", provider);
            return Vec::new();
        }

        match strategy.discover(&self.resolver).await {
            Ok(models) => models,
            // A missing or rejected credential is an expected state, not a
            // failure worth surfacing.
            Err(err) if matches!(err.kind(), ErrorKind::Authentication) => {
                debug!("provider \"{}\" is not authenticated: {}", provider, err);
                Vec::new()
            }
            Err(err) => {
                warn!("discovery failed for \"{}\": {}", provider, err);
                Vec::new()
            }
        }
    }

    /// Drops every cached discovery result. Run after bulk credential
    /// changes so stale "provider unavailable" results are not served.
    pub(crate) fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }
}

/// Deduplicates by natural key, keeping the first occurrence.
fn dedupe(models: impl IntoIterator<Item = ModelDescriptor>) -> Vec<ModelDescriptor> {
    let mut seen: HashSet<ModelKey> = HashSet::new();
    let mut out = Vec::new();

    for model in models {
        if seen.insert(model.key()) {
            out.push(model);
        }
    }

    out
}
