//! In-process store with per-entry timeouts

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

use super::{Store, StoreConfig, StoreError};
use crate::clock::{self, SharedClock};
use crate::logger::Logger;

#[derive(Debug, Clone)]
struct MemoryEntry {
    created_at: DateTime<Utc>,
    timeout: Duration,
    value: Vec<u8>,
}

/// Keeps entries in a sharded concurrent map
///
/// Operations on one key lock only the shard holding it, so unrelated keys do
/// not serialize behind each other. Contents are lost when the process exits.
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, MemoryEntry>,
    timeout: Duration,
    clock: SharedClock,
    logger: Logger,
}

impl MemoryStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let timeout = config.require_timeout("MemoryStore")?;
        config.announce("MemoryStore", None, timeout);
        Ok(Self {
            entries: DashMap::new(),
            timeout,
            clock: config.clock.clone(),
            logger: config.logger.clone(),
        })
    }

    /// Number of entries held, fresh or stale
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "MemoryStore"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.logger.info(format!("Cache: set ({key})"));
        let entry = MemoryEntry {
            created_at: self.clock.now(),
            timeout: ttl.unwrap_or(self.timeout),
            value,
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self.entries.get(key).map(|entry| entry.value.clone());
        let outcome = if value.is_some() { "hit" } else { "miss" };
        self.logger.info(format!("Cache: {outcome} ({key})"));
        Ok(value)
    }

    async fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    async fn stale(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) => clock::is_stale(entry.created_at, self.clock.now(), entry.timeout),
            None => true,
        }
    }
}
