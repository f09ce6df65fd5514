//! Store backed by a memcached server
//!
//! Speaks the memcached text protocol over a short-lived TCP connection per
//! round trip. Expiry is enforced by the server: an entry memcached has
//! evicted is simply gone, so `stale` reduces to "can it still be read".
//!
//! Failures while probing or reading are logged and reported as a miss. A
//! transient outage therefore looks exactly like an expired entry to callers.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::{Store, StoreConfig, StoreError};
use crate::clock::SharedClock;
use crate::logger::Logger;

/// Address used when no location is configured
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:11211";

/// Per round trip I/O budget
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(2);

/// Relative expiry times above this are read by memcached as unix timestamps
const MAX_RELATIVE_EXPTIME: u64 = 60 * 60 * 24 * 30;

/// memcached stores `exptime` as a 32-bit unix time
const MAX_ABSOLUTE_EXPTIME: u64 = u32::MAX as u64;

/// memcached's default `-I` item size limit
pub const MAX_ITEM_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct MemcachedStore {
    address: String,
    timeout: Duration,
    io_timeout: Duration,
    clock: SharedClock,
    logger: Logger,
}

impl MemcachedStore {
    /// Creates the store; no connection is made until the first operation
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let timeout = config.require_timeout("MemcachedStore")?;
        let address = config
            .location
            .clone()
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        if address.trim().is_empty() || address.chars().any(char::is_whitespace) {
            return Err(StoreError::Configuration(format!(
                "MemcachedStore location '{address}' is not a host:port address"
            )));
        }
        config.announce("MemcachedStore", Some(address.as_str()), timeout);

        Ok(Self {
            address,
            timeout,
            io_timeout: DEFAULT_IO_TIMEOUT,
            clock: config.clock.clone(),
            logger: config.logger.clone(),
        })
    }

    /// Overrides the bound applied to every request/response round trip
    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Converts a TTL into memcached's `exptime` field
    ///
    /// memcached reads 0 as "never expire", so a zero TTL becomes -1, which it
    /// treats as already expired.
    fn exptime(&self, ttl: Duration) -> i64 {
        let secs = ttl.as_secs();
        if secs == 0 {
            -1
        } else if secs > MAX_RELATIVE_EXPTIME {
            let now = self.clock.now().timestamp().max(0) as u64;
            now.saturating_add(secs).min(MAX_ABSOLUTE_EXPTIME) as i64
        } else {
            secs as i64
        }
    }

    async fn round_trip<T, F, Fut>(&self, exchange: F) -> Result<T, StoreError>
    where
        F: FnOnce(BufReader<TcpStream>) -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let work = async {
            let stream = TcpStream::connect(&self.address)
                .await
                .map_err(|e| StoreError::io(&self.address, e))?;
            exchange(BufReader::new(stream)).await
        };
        tokio::time::timeout(self.io_timeout, work)
            .await
            .map_err(|_| {
                StoreError::Remote(format!(
                    "memcached at {} did not answer within {:?}",
                    self.address, self.io_timeout
                ))
            })?
    }

    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let address = self.address.clone();
        let command = format!("get {key}\r\n");
        self.round_trip(|mut conn| async move {
            conn.get_mut()
                .write_all(command.as_bytes())
                .await
                .map_err(|e| StoreError::io(&address, e))?;
            read_get_response(&mut conn, &address).await
        })
        .await
    }
}

async fn read_line(conn: &mut BufReader<TcpStream>, address: &str) -> Result<String, StoreError> {
    let mut line = String::new();
    let n = conn
        .read_line(&mut line)
        .await
        .map_err(|e| StoreError::io(address, e))?;
    if n == 0 {
        return Err(StoreError::Remote(format!(
            "memcached at {address} closed the connection"
        )));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Parses `VALUE <key> <flags> <bytes>\r\n<data>\r\nEND\r\n` or `END\r\n`
async fn read_get_response(
    conn: &mut BufReader<TcpStream>,
    address: &str,
) -> Result<Option<Vec<u8>>, StoreError> {
    let header = read_line(conn, address).await?;
    if header == "END" {
        return Ok(None);
    }

    let mut parts = header.split_whitespace();
    if parts.next() != Some("VALUE") {
        return Err(StoreError::Remote(format!("unexpected reply to get: {header}")));
    }
    let len: usize = parts
        .nth(2)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| StoreError::Remote(format!("malformed VALUE line: {header}")))?;
    if len > MAX_ITEM_SIZE {
        return Err(StoreError::Remote(format!(
            "VALUE of {len} bytes exceeds the {MAX_ITEM_SIZE} byte item limit"
        )));
    }

    let mut data = vec![0u8; len + 2];
    conn.read_exact(&mut data)
        .await
        .map_err(|e| StoreError::io(address, e))?;
    data.truncate(len);

    let trailer = read_line(conn, address).await?;
    if trailer != "END" {
        return Err(StoreError::Remote(format!("expected END, got: {trailer}")));
    }
    Ok(Some(data))
}

#[async_trait]
impl Store for MemcachedStore {
    fn name(&self) -> &'static str {
        "MemcachedStore"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.logger.info(format!("Cache: set ({key})"));
        let exptime = self.exptime(ttl.unwrap_or(self.timeout));
        let address = self.address.clone();
        let mut command = format!("set {key} 0 {exptime} {}\r\n", value.len()).into_bytes();
        command.extend_from_slice(&value);
        command.extend_from_slice(b"\r\n");

        self.round_trip(|mut conn| async move {
            conn.get_mut()
                .write_all(&command)
                .await
                .map_err(|e| StoreError::io(&address, e))?;
            match read_line(&mut conn, &address).await?.as_str() {
                "STORED" => Ok(()),
                other => Err(StoreError::Remote(format!("set was not stored: {other}"))),
            }
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let data = match self.fetch(key).await {
            Ok(data) => data,
            Err(e) => {
                self.logger.warn(format!("Cache: memcached get failed ({key}): {e}"));
                None
            }
        };
        let outcome = if data.is_some() { "hit" } else { "miss" };
        self.logger.info(format!("Cache: {outcome} ({key})"));
        Ok(data)
    }

    async fn exists(&self, key: &str) -> bool {
        match self.fetch(key).await {
            Ok(data) => data.is_some(),
            Err(e) => {
                self.logger
                    .warn(format!("Cache: memcached probe failed ({key}), treating as absent: {e}"));
                false
            }
        }
    }

    async fn stale(&self, key: &str) -> bool {
        !self.exists(key).await
    }
}
