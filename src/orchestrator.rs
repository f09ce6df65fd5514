//! Get-or-fetch policy
//!
//! [`CachedClient`] answers "should this GET hit the network". Fresh entries
//! are served from the cache. Otherwise the fetcher runs; a 200 response is
//! stored (with the `max-age` from its headers as the entry timeout when
//! present) and every response is returned. When the fetch itself fails, any
//! previously stored copy is returned, however old, and only when there is
//! none does the failure reach the caller.
//!
//! Cache faults never fail a request: an unreadable entry counts as a miss and
//! a failed write only means the response was not cached.

use crate::cache::Cache;
use crate::fetch::{FetchError, Fetcher, HttpResponse, Request};
use crate::logger::Logger;

/// Where a resolved response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A fresh cache entry; no network call was made
    Cache,
    /// The fetcher answered
    Network,
    /// The fetcher failed and a stale entry was served instead
    Stale,
}

/// A response plus its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub response: HttpResponse,
    pub origin: Origin,
}

/// Caching wrapper around a fetcher
#[derive(Debug)]
pub struct CachedClient<F> {
    cache: Cache,
    fetcher: F,
    logger: Logger,
}

impl<F: Fetcher> CachedClient<F> {
    /// Uses the cache's logger for policy messages
    pub fn new(cache: Cache, fetcher: F) -> Self {
        let logger = cache.logger().clone();
        Self {
            cache,
            fetcher,
            logger,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Resolves a GET through the cache
    ///
    /// # Returns
    /// * `Ok(Resolved)` from the cache, the network, or a stale fallback
    /// * `Err(FetchError)` only if the fetch failed and nothing was cached
    pub async fn get(&self, request: &Request) -> Result<Resolved, FetchError> {
        let key = request.logical_key();

        if self.cache.exists(&key).await && !self.cache.stale(&key).await {
            self.logger.debug(format!("CACHE -- GET {}", request.display()));
            match self.cache.get::<HttpResponse>(&key, false).await {
                Ok(Some(response)) => {
                    return Ok(Resolved {
                        response,
                        origin: Origin::Cache,
                    })
                }
                // expired between the freshness check and the read
                Ok(None) => {}
                Err(e) => self
                    .logger
                    .warn(format!("Cache read failed for {}, fetching: {e}", request.display())),
            }
        }

        self.logger.debug(format!("/!\\ NETWORK -- GET {}", request.display()));
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.store(&key, request, &response).await;
                Ok(Resolved {
                    response,
                    origin: Origin::Network,
                })
            }
            Err(error) => match self.fallback(&key, request).await {
                Some(response) => Ok(Resolved {
                    response,
                    origin: Origin::Stale,
                }),
                None => Err(error),
            },
        }
    }

    async fn store(&self, key: &str, request: &Request, response: &HttpResponse) {
        if !response.is_cacheable() {
            return;
        }
        let ttl = response.max_age();
        if let Err(e) = self.cache.set(key, response, ttl).await {
            self.logger.warn(format!(
                "Cache write failed for {}, serving uncached: {e}",
                request.display()
            ));
        }
    }

    async fn fallback(&self, key: &str, request: &Request) -> Option<HttpResponse> {
        if !self.cache.exists(key).await {
            return None;
        }
        self.logger.debug("!!! NETWORK FAILED -- RETURNING STALE CACHE");
        match self.cache.get::<HttpResponse>(key, true).await {
            Ok(response) => response,
            Err(e) => {
                self.logger.warn(format!(
                    "Stale entry for {} could not be read: {e}",
                    request.display()
                ));
                None
            }
        }
    }
}
