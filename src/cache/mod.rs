//! Cache facade over a pluggable store
//!
//! Callers speak in logical keys (request path plus query); the [`Cache`]
//! encodes them into storage keys, serializes values to JSON and delegates to
//! the single [`Store`](crate::store::Store) it owns. Stale entries are hidden
//! from `get` unless the caller forces them out, which is what the stale
//! fallback in [`CachedClient`](crate::orchestrator::CachedClient) relies on.

mod manager;

pub use manager::Cache;
