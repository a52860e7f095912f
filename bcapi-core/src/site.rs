use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use thiserror::Error;

pub const SITE_TOKEN_KEY: &str = "siteToken";
pub const GENERIC_TOKEN_KEY: &str = "genericToken";
pub const CURRENT_SITE_ID: &str = "current";

const ENV_SITE_TOKEN: &str = "BCAPI_SITE_TOKEN";
const ENV_GENERIC_TOKEN: &str = "BCAPI_GENERIC_TOKEN";

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("token store is not configured; cannot look up {key}")]
    TokenStoreUnavailable { key: &'static str },
    #[error("token {key} is not present in the token store")]
    TokenMissing { key: &'static str },
    #[error("token store failure: {0}")]
    Store(String),
}

/// Persisted client-side key/value storage holding auth tokens.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SiteError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SiteError>;
    fn remove(&self, key: &str) -> Result<(), SiteError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_site_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store
            .values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(SITE_TOKEN_KEY.to_string(), token.into());
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, SiteError> {
        let values = self
            .values
            .read()
            .map_err(|_| SiteError::Store("token map lock poisoned".into()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SiteError> {
        let mut values = self
            .values
            .write()
            .map_err(|_| SiteError::Store("token map lock poisoned".into()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SiteError> {
        let mut values = self
            .values
            .write()
            .map_err(|_| SiteError::Store("token map lock poisoned".into()))?;
        values.remove(key);
        Ok(())
    }
}

/// Read-only store backed by `BCAPI_SITE_TOKEN` and `BCAPI_GENERIC_TOKEN`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvTokenStore;

impl EnvTokenStore {
    fn variable(key: &str) -> Option<&'static str> {
        match key {
            SITE_TOKEN_KEY => Some(ENV_SITE_TOKEN),
            GENERIC_TOKEN_KEY => Some(ENV_GENERIC_TOKEN),
            _ => None,
        }
    }
}

impl TokenStore for EnvTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, SiteError> {
        Ok(Self::variable(key)
            .and_then(|name| std::env::var(name).ok())
            .filter(|value| !value.is_empty()))
    }

    fn set(&self, key: &str, _value: &str) -> Result<(), SiteError> {
        Err(SiteError::Store(format!(
            "environment token store is read-only ({key})"
        )))
    }

    fn remove(&self, key: &str) -> Result<(), SiteError> {
        Err(SiteError::Store(format!(
            "environment token store is read-only ({key})"
        )))
    }
}

/// Site-level settings shared by every request: where the API lives and how
/// to authenticate.
#[derive(Clone, Default)]
pub struct SiteHelper {
    root_url: String,
    store: Option<Arc<dyn TokenStore>>,
}

impl fmt::Debug for SiteHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteHelper")
            .field("root_url", &self.root_url)
            .field("site_id", &self.site_id())
            .field("has_token_store", &self.store.is_some())
            .finish()
    }
}

impl SiteHelper {
    /// Helper without a token store. Every token lookup fails until one is
    /// attached with [`SiteHelper::with_token_store`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_root_url(mut self, root_url: impl Into<String>) -> Self {
        self.root_url = root_url.into();
        self
    }

    /// API prefix relative to the origin; empty means the origin itself.
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Always [`CURRENT_SITE_ID`]: requests address the site the client
    /// operates against.
    pub fn site_id(&self) -> &str {
        CURRENT_SITE_ID
    }

    pub fn has_token_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn site_token(&self) -> Result<String, SiteError> {
        self.token(SITE_TOKEN_KEY)
    }

    pub fn generic_token(&self) -> Result<String, SiteError> {
        self.token(GENERIC_TOKEN_KEY)
    }

    fn token(&self, key: &'static str) -> Result<String, SiteError> {
        let store = self
            .store
            .as_ref()
            .ok_or(SiteError::TokenStoreUnavailable { key })?;
        store.get(key)?.ok_or(SiteError::TokenMissing { key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_id_is_current() {
        assert_eq!(SiteHelper::new().site_id(), "current");
        let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_site_token("abc"));
        let helper = SiteHelper::new()
            .with_token_store(store)
            .with_root_url("/proxy");
        assert_eq!(helper.site_id(), "current");
    }

    #[test]
    fn root_url_defaults_to_empty() {
        assert_eq!(SiteHelper::new().root_url(), "");
    }

    #[test]
    fn tokens_fail_without_store() {
        let helper = SiteHelper::new();
        assert!(matches!(
            helper.generic_token(),
            Err(SiteError::TokenStoreUnavailable {
                key: GENERIC_TOKEN_KEY
            })
        ));
        assert!(matches!(
            helper.site_token(),
            Err(SiteError::TokenStoreUnavailable {
                key: SITE_TOKEN_KEY
            })
        ));
    }

    #[test]
    fn tokens_are_read_by_key() {
        let store = Arc::new(MemoryTokenStore::new());
        store.set(SITE_TOKEN_KEY, "site-1").unwrap();
        store.set(GENERIC_TOKEN_KEY, "generic-1").unwrap();
        let helper = SiteHelper::new().with_token_store(store.clone());

        assert_eq!(helper.site_token().unwrap(), "site-1");
        assert_eq!(helper.generic_token().unwrap(), "generic-1");

        store.remove(GENERIC_TOKEN_KEY).unwrap();
        assert!(matches!(
            helper.generic_token(),
            Err(SiteError::TokenMissing { .. })
        ));
    }

    #[test]
    fn env_store_rejects_writes() {
        assert!(EnvTokenStore.set(SITE_TOKEN_KEY, "x").is_err());
        assert!(EnvTokenStore.get("unknownKey").unwrap().is_none());
    }
}
