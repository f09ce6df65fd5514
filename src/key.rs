//! Storage key derivation
//!
//! Logical keys (request path plus serialized query) are never handed to a
//! store. They are normalized to lower case and hashed into a fixed-length hex
//! string, which is safe as a filename and as a memcached key.

use sha2::{Digest, Sha256};

/// Length of every encoded storage key
pub const STORAGE_KEY_LEN: usize = 64;

/// Encodes a logical key into a storage key
///
/// Deterministic and case-insensitive: `"/Foo"` and `"/foo"` map to the same
/// storage key.
pub fn encode(logical_key: &str) -> String {
    let normalized = logical_key.to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}
