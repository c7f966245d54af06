use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use toml;

/// Whether a provider participates in discovery.
///
/// `Auto` enables the provider whenever a usable credential can be resolved
/// for it. `Enabled` forces participation (discovery will still yield nothing
/// without a credential), and `Disabled` removes it entirely.
#[derive(Deserialize, Serialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ProviderActivationPolicy {
    #[default]
    Auto,
    Enabled,
    Disabled,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub(crate) struct ProviderConfig {
    #[serde(default)]
    pub activate: ProviderActivationPolicy,
    /// Override for the provider's model-listing endpoint base URL.
    pub api_base: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub(crate) struct CacheConfig {
    /// How long a per-provider discovery result is trusted, in seconds.
    pub discovery_ttl_secs: Option<u64>,
    /// How long a credential-availability check is trusted, in seconds.
    pub availability_ttl_secs: Option<u64>,
    /// Grace window for non-blocking availability reads, in seconds. A stale
    /// entry younger than this is trusted rather than blocking on I/O.
    pub availability_grace_secs: Option<u64>,
}

pub(crate) const DEFAULT_DISCOVERY_TTL: Duration = Duration::from_secs(10 * 60);
pub(crate) const DEFAULT_AVAILABILITY_TTL: Duration = Duration::from_secs(15 * 60);
pub(crate) const DEFAULT_AVAILABILITY_GRACE: Duration = Duration::from_secs(60 * 60);

impl CacheConfig {
    pub(crate) fn discovery_ttl(&self) -> Duration {
        self.discovery_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DISCOVERY_TTL)
    }

    pub(crate) fn availability_ttl(&self) -> Duration {
        self.availability_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_AVAILABILITY_TTL)
    }

    pub(crate) fn availability_grace(&self) -> Duration {
        self.availability_grace_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_AVAILABILITY_GRACE)
    }
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Config {
    /// Path of the JSON catalog file. Defaults to
    /// `~/.config/modelkit/catalog.json`.
    pub catalog: Option<PathBuf>,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Keyed by provider name, e.g. `[providers.openrouter]`.
    #[serde(default)]
    pub providers: std::collections::BTreeMap<String, ProviderConfig>,
}

impl Config {
    pub(crate) fn provider(&self, name: &str) -> ProviderConfig {
        self.providers
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn catalog_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.catalog {
            return Some(path.clone());
        }

        let home = std::env::var_os("HOME")?;

        Some(PathBuf::from(home).join(".config/modelkit/catalog.json"))
    }
}

fn get_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME");

    if let Some(home) = home {
        let home = PathBuf::from(home);

        const USER_PATHS: [&str; 2] = [".config/modelkit/config.toml", ".modelkit.toml"];

        for &path in USER_PATHS.iter() {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/modelkit.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn parse_config_or_die<S: serde::de::DeserializeOwned>(config: &str) -> S {
    let r: Result<S, toml::de::Error> = toml::de::from_str(config);

    match r {
        Ok(s) => s,
        Err(err) => die::die!("failed to parse config: {}", err),
    }
}

fn warn_on_extra_fields_helper<'a>(
    path: &mut Vec<&'a String>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        if let Some(config_value) = config.get(user_key) {
            if let (toml::Value::Table(user_value), toml::Value::Table(config_value)) =
                (user_value, config_value)
            {
                warn_on_extra_fields_helper(path, user_value, config_value)
            }
        } else {
            let path: Vec<&str> = path.iter().map(|&s| s.as_str()).collect();

            eprintln!(
                "warning: config contains extraneous key \"{}\", ignoring",
                path.join(".")
            );
        }

        path.pop();
    }
}

fn warn_on_extra_fields(config: &Config, raw_config: &str) {
    let user_config: toml::Table = parse_config_or_die(raw_config);

    let config: toml::Table = {
        let seralized_config = toml::ser::to_string(&config).expect("failed to reserialize config");

        parse_config_or_die(&seralized_config)
    };

    let mut path = Vec::new();

    warn_on_extra_fields_helper(&mut path, &user_config, &config);
}

pub(crate) fn read_config(config: Option<PathBuf>) -> Config {
    let config_path = config.or_else(get_config_path);

    if let Some(path) = config_path {
        let raw_config = std::fs::read_to_string(path).expect("failed to read config");

        let config: Config = parse_config_or_die(&raw_config);

        warn_on_extra_fields(&config, &raw_config);

        config
    } else {
        Config::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_lookup_is_case_insensitive_via_lowercased_keys() {
        let raw = r#"
[providers.openrouter]
activate = "enabled"
api_base = "https://openrouter.ai/api/v1"
"#;
        let config: Config = toml::de::from_str(raw).unwrap();

        let provider = config.provider("OpenRouter");

        assert_eq!(provider.activate, ProviderActivationPolicy::Enabled);
        assert_eq!(
            provider.api_base.as_deref(),
            Some("https://openrouter.ai/api/v1")
        );
    }

    #[test]
    fn cache_defaults() {
        let config = Config::default();

        assert_eq!(config.cache.discovery_ttl(), DEFAULT_DISCOVERY_TTL);
        assert_eq!(config.cache.availability_ttl(), DEFAULT_AVAILABILITY_TTL);
        assert_eq!(
            config.cache.availability_grace(),
            DEFAULT_AVAILABILITY_GRACE
        );
    }

    #[test]
    fn ttl_overrides_are_honored() {
        let raw = r#"
[cache]
discovery_ttl_secs = 5
availability_ttl_secs = 7
"#;
        let config: Config = toml::de::from_str(raw).unwrap();

        assert_eq!(config.cache.discovery_ttl(), Duration::from_secs(5));
        assert_eq!(config.cache.availability_ttl(), Duration::from_secs(7));
        assert_eq!(
            config.cache.availability_grace(),
            DEFAULT_AVAILABILITY_GRACE
        );
    }
}
