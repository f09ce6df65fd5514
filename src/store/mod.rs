//! Pluggable storage backends
//!
//! A [`Store`] persists opaque byte values under already-encoded storage keys
//! and knows when each entry was created. Three backends ship with the crate:
//! an in-process map ([`MemoryStore`]), a directory of files ([`FileStore`]) and
//! a memcached server ([`MemcachedStore`]). Backends are looked up by name
//! through a [`StoreRegistry`], which also accepts custom constructors.

mod file;
mod memcached;
mod memory;

pub use file::FileStore;
pub use memcached::MemcachedStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::clock::{self, SharedClock};
use crate::logger::Logger;

/// Errors raised while configuring or talking to a store
#[derive(Debug, Error)]
pub enum StoreError {
    /// No constructor is registered under this name
    #[error("The cache store '{0}' was not found. Registered stores: {1}")]
    StoreNotFound(String, String),

    /// A required option is missing or invalid
    #[error("Invalid store configuration: {0}")]
    Configuration(String),

    /// Disk or socket I/O failed
    #[error("Storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be encoded or decoded
    #[error("Failed to (de)serialize cached value: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote service answered with an error
    #[error("Remote store error: {0}")]
    Remote(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// The four-operation capability contract every backend implements
///
/// Keys are storage keys produced by [`crate::key::encode`]; a store never sees
/// the logical key. `get` ignores staleness, filtering is the caller's job.
#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    /// Short backend name used in log lines
    fn name(&self) -> &'static str;

    /// Store-wide default timeout
    fn timeout(&self) -> Duration;

    /// Persists `value`, stamping the creation time and replacing any previous
    /// value. `ttl` overrides the default timeout where the backend supports
    /// per-entry timeouts.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Returns the stored value regardless of staleness
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Whether a value is persisted for `key`, fresh or not
    async fn exists(&self, key: &str) -> bool;

    /// True when the key is absent or its entry has outlived its timeout
    async fn stale(&self, key: &str) -> bool;
}

/// Options handed to a store constructor
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Default entry timeout. Required by every built-in store.
    pub timeout: Option<Duration>,
    /// Directory (file store) or `host:port` (memcached store)
    pub location: Option<String>,
    pub logger: Logger,
    pub clock: SharedClock,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            location: None,
            logger: Logger::default(),
            clock: clock::system(),
        }
    }
}

impl StoreConfig {
    /// Creates a config with the given default timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the timeout or a configuration error naming the store
    pub fn require_timeout(&self, store: &str) -> Result<Duration, StoreError> {
        self.timeout.ok_or_else(|| {
            StoreError::Configuration(format!("{store} needs the timeout option to be set"))
        })
    }

    /// Logs the standard "using store" line
    pub(crate) fn announce(&self, store: &str, location: Option<&str>, timeout: Duration) {
        let mut message = format!("Cache: Using {store}");
        if let Some(location) = location {
            message.push_str(&format!(" in location: {location}"));
        }
        message.push_str(&format!(" with timeout {} sec", timeout.as_secs()));
        self.logger.info(message);
    }
}

/// Builds a store from a config
pub type StoreConstructor =
    Arc<dyn Fn(&StoreConfig) -> Result<Arc<dyn Store>, StoreError> + Send + Sync>;

/// Named backend dispatch
///
/// Names are matched case-insensitively. Unknown names fail with
/// [`StoreError::StoreNotFound`] when the cache is configured, not on first use.
#[derive(Clone)]
pub struct StoreRegistry {
    constructors: HashMap<String, StoreConstructor>,
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.names())
            .finish()
    }
}

impl Default for StoreRegistry {
    /// Registry with `memory`, `file` and `memcached`
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("memory", |config| Ok(Arc::new(MemoryStore::new(config)?)));
        registry.register("file", |config| Ok(Arc::new(FileStore::new(config)?)));
        registry.register("memcached", |config| {
            Ok(Arc::new(MemcachedStore::new(config)?))
        });
        registry
    }
}

impl StoreRegistry {
    /// Registry with no backends at all
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registers (or replaces) a backend under `name`
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&StoreConfig) -> Result<Arc<dyn Store>, StoreError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_lowercase(), Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_lowercase())
    }

    /// Sorted list of registered names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Constructs the store registered under `name`
    pub fn build(&self, name: &str, config: &StoreConfig) -> Result<Arc<dyn Store>, StoreError> {
        let constructor = self.constructors.get(&name.to_lowercase()).ok_or_else(|| {
            StoreError::StoreNotFound(name.to_string(), self.names().join(", "))
        })?;
        constructor(config)
    }
}
