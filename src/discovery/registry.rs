use std::collections::HashMap;
use std::sync::Arc;

use super::DiscoveryStrategy;

/// Strategies registered by provider name.
///
/// Lookup is case-insensitive. An unregistered name is a normal outcome (a
/// provider not yet wired up), so lookup returns an `Option` rather than an
/// error.
#[derive(Default)]
pub(crate) struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn DiscoveryStrategy>>,
}

impl StrategyRegistry {
    pub(crate) fn new() -> StrategyRegistry {
        StrategyRegistry::default()
    }

    pub(crate) fn register(&mut self, strategy: Arc<dyn DiscoveryStrategy>) {
        let name = strategy.provider_name().trim().to_lowercase();

        if self.strategies.insert(name, strategy).is_some() {
            panic!("the same provider was registered twice");
        }
    }

    pub(crate) fn get(&self, provider: &str) -> Option<Arc<dyn DiscoveryStrategy>> {
        self.strategies
            .get(&provider.trim().to_lowercase())
            .cloned()
    }

    /// Registered provider names, sorted for stable iteration order.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.keys().cloned().collect();

        names.sort();

        names
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
