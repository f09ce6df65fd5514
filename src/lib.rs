//! respcache library
//!
//! A transparent response cache for HTTP GET calls: fresh entries are served
//! locally, misses go to the network, and a stale copy is served when the
//! network fails.

pub mod cache;
pub mod cli;
pub mod clock;
pub mod fetch;
pub mod key;
pub mod logger;
pub mod orchestrator;
pub mod store;

pub use cache::Cache;
pub use fetch::{FetchError, Fetcher, HttpFetcher, HttpResponse, Request};
pub use logger::Logger;
pub use orchestrator::{CachedClient, Origin, Resolved};
pub use store::{Store, StoreConfig, StoreError, StoreRegistry};
