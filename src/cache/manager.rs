//! Cache facade hiding key encoding from callers
//!
//! Provides a `Cache` that serializes values to JSON, stores them under hashed
//! keys and answers freshness questions on behalf of its store.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::key;
use crate::logger::Logger;
use crate::store::{Store, StoreConfig, StoreError, StoreRegistry};

/// Owns exactly one store for its whole lifetime
///
/// Misses are never errors: absence (or staleness without `force`) is `None`.
/// Errors only surface for real storage or serialization failures.
#[derive(Debug, Clone)]
pub struct Cache {
    store: Arc<dyn Store>,
    logger: Logger,
}

impl Cache {
    /// Builds a cache over one of the built-in stores (`memory`, `file`,
    /// `memcached`)
    ///
    /// # Errors
    /// * `StoreError::StoreNotFound` if `store` is not a known backend
    /// * `StoreError::Configuration` if the backend rejects `config`
    pub fn new(store: &str, config: StoreConfig) -> Result<Self, StoreError> {
        Self::with_registry(&StoreRegistry::default(), store, config)
    }

    /// Builds a cache over a backend looked up in `registry`
    pub fn with_registry(
        registry: &StoreRegistry,
        store: &str,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        let logger = config.logger.clone();
        let store = registry.build(store, &config)?;
        Ok(Self { store, logger })
    }

    /// Wraps an already constructed store
    pub fn with_store(store: Arc<dyn Store>, logger: Logger) -> Self {
        Self { store, logger }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Reads a value
    ///
    /// Returns `None` when nothing is stored, or when the entry is stale and
    /// `force` is false. With `force`, a stale entry is returned as-is.
    pub async fn get<T: DeserializeOwned>(
        &self,
        logical_key: &str,
        force: bool,
    ) -> Result<Option<T>, StoreError> {
        let storage_key = key::encode(logical_key);
        if !force && self.store.stale(&storage_key).await {
            return Ok(None);
        }
        match self.store.get(&storage_key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes a value, replacing whatever was stored under `logical_key`
    ///
    /// `timeout` overrides the store default on backends with per-entry
    /// timeouts.
    pub async fn set<T: Serialize>(
        &self,
        logical_key: &str,
        value: &T,
        timeout: Option<Duration>,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.store.set(&key::encode(logical_key), bytes, timeout).await
    }

    /// Whether anything is stored for `logical_key`, fresh or stale
    pub async fn exists(&self, logical_key: &str) -> bool {
        self.store.exists(&key::encode(logical_key)).await
    }

    /// Whether `logical_key` is missing or past its timeout
    pub async fn stale(&self, logical_key: &str) -> bool {
        self.store.stale(&key::encode(logical_key)).await
    }
}
