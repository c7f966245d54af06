//! Access to secret material.
//!
//! The [`SecretStore`] trait is the only path through which the rest of the
//! crate touches persisted secrets. The default implementation,
//! [`KeyringStore`], wraps the operating system keychain. [`MemoryStore`]
//! backs tests. Environment variables are read directly by the credential
//! resolver and are never written.
//!
//! Store failures are absorbed here: a failed read is reported as "no
//! secret", a failed write as `false`. Callers treat absence as a normal,
//! displayable state.

use async_trait::async_trait;

use crate::debug;

/// Named secret storage with async CRUD.
#[async_trait]
pub(crate) trait SecretStore: Send + Sync {
    /// Returns the secret stored under `name`, or None if it is absent or
    /// the store could not be read.
    async fn get(&self, name: &str) -> Option<String>;

    /// Stores `value` under `name`. Returns false if the write failed.
    async fn set(&self, name: &str, value: &str) -> bool;

    /// Removes the secret under `name`. Deleting an absent secret succeeds.
    async fn delete(&self, name: &str) -> bool;
}

/// Secret storage backed by the operating system keychain.
pub(crate) struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub(crate) fn new() -> KeyringStore {
        KeyringStore {
            service: "modelkit".to_string(),
        }
    }

    fn entry(&self, name: &str) -> Option<keyring::Entry> {
        match keyring::Entry::new(&self.service, name) {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!("keyring entry \"{}\" unavailable: {}", name, err);
                None
            }
        }
    }
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, name: &str) -> Option<String> {
        let entry = self.entry(name)?;

        match entry.get_password() {
            Ok(secret) => Some(secret),
            Err(keyring::Error::NoEntry) => None,
            Err(err) => {
                debug!("keyring read of \"{}\" failed: {}", name, err);
                None
            }
        }
    }

    async fn set(&self, name: &str, value: &str) -> bool {
        let Some(entry) = self.entry(name) else {
            return false;
        };

        match entry.set_password(value) {
            Ok(()) => true,
            Err(err) => {
                crate::error!("failed to store secret \"{}\": {}", name, err);
                false
            }
        }
    }

    async fn delete(&self, name: &str) -> bool {
        let Some(entry) = self.entry(name) else {
            return false;
        };

        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => true,
            Err(err) => {
                crate::error!("failed to delete secret \"{}\": {}", name, err);
                false
            }
        }
    }
}

/// In-memory secret storage for tests and ephemeral sessions.
#[derive(Default)]
pub(crate) struct MemoryStore {
    secrets: std::sync::RwLock<std::collections::HashMap<String, String>>,
}

impl MemoryStore {
    pub(crate) fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, name: &str) -> Option<String> {
        self.secrets.read().unwrap().get(name).cloned()
    }

    async fn set(&self, name: &str, value: &str) -> bool {
        self.secrets
            .write()
            .unwrap()
            .insert(name.to_string(), value.to_string());

        true
    }

    async fn delete(&self, name: &str) -> bool {
        self.secrets.write().unwrap().remove(name);

        true
    }
}

/// Scans the process environment for secrets under `prefix`. Used once at
/// startup (and by `key list`) to report which providers are configured
/// through the environment.
pub(crate) fn env_secrets_with_prefix(prefix: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();

    for (name, value) in std::env::vars() {
        if name.starts_with(prefix) && !value.trim().is_empty() {
            found.push((name, value));
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();

        assert!(store.get("AI_KEY_GROQ").await.is_none());
        assert!(store.set("AI_KEY_GROQ", "gsk_test").await);
        assert_eq!(store.get("AI_KEY_GROQ").await.as_deref(), Some("gsk_test"));
        assert!(store.delete("AI_KEY_GROQ").await);
        assert!(store.get("AI_KEY_GROQ").await.is_none());
    }

    #[tokio::test]
    async fn deleting_absent_secret_succeeds() {
        let store = MemoryStore::new();

        assert!(store.delete("AI_KEY_NOPE").await);
    }
}
