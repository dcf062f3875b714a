//! Cache store backends.
//!
//! The sample store only needs hashes, sets and a prefix scan, so the
//! backend contract is the small subset of a Redis-like key/value store the
//! engine actually uses. Implementations must be safe to share between
//! concurrent tasks.

use async_trait::async_trait;
use samsto_core::SamstoResult;
use std::collections::HashMap;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod resilient;

pub use memory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use self::redis::RedisBackend;
pub use resilient::{ResilientBackend, RetryPolicy};

/// Flat field map stored in a hash.
pub type FieldMap = HashMap<String, String>;

/// Key/value store operations used by the sample store.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// All fields of a hash, or `None` if the key does not exist.
    async fn hash_get(&self, key: &str) -> SamstoResult<Option<FieldMap>>;

    /// Replace a hash wholesale. Fields absent from `fields` are dropped.
    async fn hash_replace(&self, key: &str, fields: &FieldMap) -> SamstoResult<()>;

    /// Add a member to a set. Returns `true` if it was not already present.
    async fn set_add(&self, key: &str, member: &str) -> SamstoResult<bool>;

    /// Remove a member from a set. Returns `true` if it was present.
    async fn set_remove(&self, key: &str, member: &str) -> SamstoResult<bool>;

    /// All members of a set; empty if the key does not exist.
    async fn set_members(&self, key: &str) -> SamstoResult<Vec<String>>;

    async fn set_contains(&self, key: &str, member: &str) -> SamstoResult<bool>;

    /// Cardinality of a set.
    async fn set_len(&self, key: &str) -> SamstoResult<u64>;

    /// Delete keys of any type. Returns how many existed.
    async fn delete(&self, keys: &[String]) -> SamstoResult<u64>;

    /// Every key starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> SamstoResult<Vec<String>>;

    /// Check the store is reachable.
    async fn ping(&self) -> SamstoResult<()>;
}
