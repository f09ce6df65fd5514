//! Store that keeps one file per key in a directory
//!
//! The creation time of an entry is the file's modification time; nothing else
//! is persisted next to the value. Only the store-wide timeout applies.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{Store, StoreConfig, StoreError};
use crate::clock::{self, SharedClock};
use crate::logger::Logger;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Persists entries to the filesystem
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    timeout: Duration,
    clock: SharedClock,
    logger: Logger,
}

impl FileStore {
    /// Creates the store, creating its directory if needed
    ///
    /// Without a `location`, uses the per-user cache directory
    /// (`~/.cache/respcache/` on Linux) or the system temp directory when no
    /// home directory can be determined.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let timeout = config.require_timeout("FileStore")?;
        let dir = match &config.location {
            Some(location) => PathBuf::from(location),
            None => default_dir(),
        };
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        config.announce("FileStore", Some(dir.to_string_lossy().as_ref()), timeout);

        Ok(Self {
            dir,
            timeout,
            clock: config.clock.clone(),
            logger: config.logger.clone(),
        })
    }

    /// Directory holding the cache files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{key}.{}.{n}.tmp", std::process::id()))
    }

    /// Modification time of the entry file, if it is there
    async fn created(&self, key: &str) -> Option<DateTime<Utc>> {
        let metadata = tokio::fs::metadata(self.entry_path(key)).await.ok()?;
        if !metadata.is_file() {
            return None;
        }
        metadata.modified().ok().map(DateTime::<Utc>::from)
    }
}

fn default_dir() -> PathBuf {
    ProjectDirs::from("", "", "respcache")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir)
}

#[async_trait]
impl Store for FileStore {
    fn name(&self) -> &'static str {
        "FileStore"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Writes to a temp file and renames it over the entry, so readers see
    /// either the old value or the new one. `ttl` is not persisted.
    async fn set(&self, key: &str, value: Vec<u8>, _ttl: Option<Duration>) -> Result<(), StoreError> {
        self.logger.info(format!("Cache: set ({key})"));
        let path = self.entry_path(key);
        let temp = self.temp_path(key);

        if let Err(e) = tokio::fs::write(&temp, &value).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StoreError::io(&temp, e));
        }
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StoreError::io(&path, e));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.entry_path(key);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                self.logger.info(format!("Cache: hit ({key})"));
                Ok(Some(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.logger.info(format!("Cache: miss ({key})"));
                Ok(None)
            }
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        self.created(key).await.is_some()
    }

    async fn stale(&self, key: &str) -> bool {
        match self.created(key).await {
            Some(created_at) => clock::is_stale(created_at, self.clock.now(), self.timeout),
            None => true,
        }
    }
}
