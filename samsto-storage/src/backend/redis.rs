//! Redis backend over a multiplexed async connection.

use super::{FieldMap, StoreBackend};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError};
use samsto_core::{SamstoError, SamstoResult, StoreError};
use std::collections::HashMap;
use tracing::{debug, info};

const SCAN_BATCH: usize = 500;

/// Store backend talking to a single Redis server.
///
/// The multiplexed connection is cheap to clone and pipelines concurrent
/// requests, so every operation works on its own clone.
#[derive(Clone)]
pub struct RedisBackend {
    connection: MultiplexedConnection,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend").finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Open a client for `url` and establish the multiplexed connection.
    pub async fn connect(url: &str) -> SamstoResult<Self> {
        let client = redis::Client::open(url).map_err(|e| unavailable(&e))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| unavailable(&e))?;
        info!("Connected to Redis cache store");
        Ok(Self { connection })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

fn unavailable(e: &RedisError) -> SamstoError {
    StoreError::Unavailable {
        reason: e.to_string(),
    }
    .into()
}

/// Transport faults are retryable; anything else is a problem with the key.
fn map_err(key: &str, e: RedisError) -> SamstoError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
    {
        unavailable(&e)
    } else {
        StoreError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()
    }
}

/// Escape glob metacharacters so a literal prefix can be used in `MATCH`.
fn escape_pattern(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

#[async_trait]
impl StoreBackend for RedisBackend {
    async fn hash_get(&self, key: &str) -> SamstoResult<Option<FieldMap>> {
        let mut conn = self.conn();
        let fields: HashMap<String, String> =
            conn.hgetall(key).await.map_err(|e| map_err(key, e))?;
        Ok(if fields.is_empty() { None } else { Some(fields) })
    }

    async fn hash_replace(&self, key: &str, fields: &FieldMap) -> SamstoResult<()> {
        let mut conn = self.conn();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !fields.is_empty() {
            let items: Vec<(&str, &str)> = fields
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            pipe.hset_multiple(key, &items).ignore();
        }
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| map_err(key, e))?;
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> SamstoResult<bool> {
        let mut conn = self.conn();
        let added: i64 = conn.sadd(key, member).await.map_err(|e| map_err(key, e))?;
        Ok(added > 0)
    }

    async fn set_remove(&self, key: &str, member: &str) -> SamstoResult<bool> {
        let mut conn = self.conn();
        let removed: i64 = conn.srem(key, member).await.map_err(|e| map_err(key, e))?;
        Ok(removed > 0)
    }

    async fn set_members(&self, key: &str) -> SamstoResult<Vec<String>> {
        let mut conn = self.conn();
        conn.smembers(key).await.map_err(|e| map_err(key, e))
    }

    async fn set_contains(&self, key: &str, member: &str) -> SamstoResult<bool> {
        let mut conn = self.conn();
        conn.sismember(key, member)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn set_len(&self, key: &str) -> SamstoResult<u64> {
        let mut conn = self.conn();
        conn.scard(key).await.map_err(|e| map_err(key, e))
    }

    async fn delete(&self, keys: &[String]) -> SamstoResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        conn.del(keys.to_vec())
            .await
            .map_err(|e| map_err(&keys.join(","), e))
    }

    async fn scan_prefix(&self, prefix: &str) -> SamstoResult<Vec<String>> {
        let mut conn = self.conn();
        let pattern = escape_pattern(prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| map_err(prefix, e))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        debug!(prefix = prefix, count = keys.len(), "Scanned cache store keys");
        Ok(keys)
    }

    async fn ping(&self) -> SamstoResult<()> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_err("PING", e))?;
        Ok(())
    }
}
