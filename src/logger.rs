//! Injectable logging sink
//!
//! Every cache, store and client holds its own [`Logger`] handle instead of
//! sharing process-wide state. The default sink forwards to `tracing`; the
//! binary installs a subscriber that writes to standard error.

use std::fmt;
use std::sync::Arc;
use tracing::Level;

/// Destination for leveled cache messages
pub trait LogSink: Send + Sync + fmt::Debug {
    fn log(&self, level: Level, message: &str);
}

/// Sink that emits `tracing` events under the `respcache` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "respcache", "{message}"),
            Level::WARN => tracing::warn!(target: "respcache", "{message}"),
            Level::INFO => tracing::info!(target: "respcache", "{message}"),
            Level::DEBUG => tracing::debug!(target: "respcache", "{message}"),
            Level::TRACE => tracing::trace!(target: "respcache", "{message}"),
        }
    }
}

/// Cheap, cloneable handle to an optional sink
#[derive(Debug, Clone)]
pub struct Logger {
    sink: Option<Arc<dyn LogSink>>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl Logger {
    /// Logger that forwards to `tracing`
    pub fn tracing() -> Self {
        Self {
            sink: Some(Arc::new(TracingSink)),
        }
    }

    /// Logger that drops every message
    pub fn silent() -> Self {
        Self { sink: None }
    }

    /// Logger backed by a custom sink
    pub fn with_sink(sink: Arc<dyn LogSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Whether messages go anywhere at all
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::INFO, message.as_ref());
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::DEBUG, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::WARN, message.as_ref());
    }

    fn log(&self, level: Level, message: &str) {
        if let Some(sink) = &self.sink {
            sink.log(level, message);
        }
    }
}

/// Sink that keeps messages in memory, for assertions in tests
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: std::sync::Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of everything logged so far
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Whether any message at `level` contains `needle`
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(l, message)| *l == level && message.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}
