use std::io::{self, IsTerminal};
use std::sync::Arc;

use crate::catalog::store::{FileCatalog, MemoryCatalog};
use crate::catalog::{CatalogManager, CatalogStore};
use crate::config::{Config, ProviderActivationPolicy};
use crate::credentials::CredentialResolver;
use crate::discovery::openai_compat::OpenAiCompatStrategy;
use crate::discovery::{DiscoveryOrchestrator, StrategyRegistry};
use crate::secrets::KeyringStore;
use crate::{die, warn, RequestedColorMode};

pub(crate) mod keys;
pub(crate) mod models;
pub(crate) mod providers;
pub(crate) mod table;

#[derive(Clone, Copy, strum_macros::Display)]
pub(crate) enum ColorMode {
    On,
    Off,
}

impl ColorMode {
    /// Returns whether ANSI color should be used. An explicit preference
    /// (flag or the "NO_COLOR" environment variable) is honored; otherwise
    /// color is enabled when stdout is a terminal.
    pub(crate) fn resolve_auto(cm: RequestedColorMode) -> ColorMode {
        match cm {
            RequestedColorMode::Auto => {
                let disable_color =
                    std::env::var_os("NO_COLOR").is_some() || !io::stdout().is_terminal();

                if disable_color {
                    ColorMode::Off
                } else {
                    ColorMode::On
                }
            }
            RequestedColorMode::On => ColorMode::On,
            RequestedColorMode::Off => ColorMode::Off,
        }
    }
}

/// API bases for the providers wired up out of the box. All speak the
/// OpenAI-compatible listing shape. Config entries may override the base or
/// disable an entry, and may add providers beyond this list.
const DEFAULT_PROVIDERS: [(&str, &str); 4] = [
    ("openai", "https://api.openai.com/v1"),
    ("openrouter", "https://openrouter.ai/api/v1"),
    ("groq", "https://api.groq.com/openai/v1"),
    ("mistral", "https://api.mistral.ai/v1"),
];

/// The wired-together subsystem behind every CLI command.
pub(crate) struct Stack {
    pub resolver: Arc<CredentialResolver>,
    pub orchestrator: Arc<DiscoveryOrchestrator>,
    pub manager: CatalogManager,
}

fn build_registry(config: &Config) -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();

    for (name, default_base) in DEFAULT_PROVIDERS {
        let provider_config = config.provider(name);

        if provider_config.activate == ProviderActivationPolicy::Disabled {
            continue;
        }

        let api_base = provider_config.api_base.as_deref().unwrap_or(default_base);

        match OpenAiCompatStrategy::new(name, api_base) {
            Ok(strategy) => registry.register(Arc::new(strategy)),
            Err(err) => die!("API base for \"{}\" is invalid: {}", name, err),
        }
    }

    for (name, provider_config) in &config.providers {
        if DEFAULT_PROVIDERS.iter().any(|(known, _)| known == name) {
            continue;
        }

        if provider_config.activate == ProviderActivationPolicy::Disabled {
            continue;
        }

        let Some(api_base) = &provider_config.api_base else {
            warn!(
                "provider \"{}\" has no api_base configured, skipping",
                name
            );
            continue;
        };

        match OpenAiCompatStrategy::new(name, api_base) {
            Ok(strategy) => registry.register(Arc::new(strategy)),
            Err(err) => die!("API base for \"{}\" is invalid: {}", name, err),
        }
    }

    registry
}

pub(crate) async fn build_stack(config: &Config) -> Stack {
    let secret_store = Arc::new(KeyringStore::new());
    let resolver = Arc::new(CredentialResolver::new(secret_store, &config.cache));

    let registry = build_registry(config);

    if registry.is_empty() {
        warn!("no providers are enabled");
    }

    let orchestrator = Arc::new(DiscoveryOrchestrator::new(
        registry,
        resolver.clone(),
        &config.cache,
    ));

    let catalog: Arc<dyn CatalogStore> = match config.catalog_path() {
        Some(path) => Arc::new(FileCatalog::open(path)),
        None => {
            warn!("HOME is not set, catalog will not be persisted");
            Arc::new(MemoryCatalog::new())
        }
    };

    let manager = CatalogManager::new(catalog, orchestrator.clone(), resolver.clone()).await;

    Stack {
        resolver,
        orchestrator,
        manager,
    }
}

fn format_output<O: table::IntoTable + serde::Serialize>(object: O, format: crate::ListingFormat) {
    match format {
        crate::ListingFormat::Json => {
            let output = serde_json::to_string_pretty(&object).expect("failed to serialize object");

            println!("{}", output);
        }
        crate::ListingFormat::Table => {
            let tab = object.into_table();

            print!("{}", tab);
        }
        crate::ListingFormat::HeaderlessTable => {
            let mut tab = object.into_table();

            tab.print_header(false);

            print!("{}", tab);
        }
    }
}
