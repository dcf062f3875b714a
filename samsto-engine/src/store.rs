//! Store backend construction from configuration.

use crate::config::EngineConfig;
use samsto_core::{ConfigError, SamstoResult};
use samsto_storage::{InMemoryBackend, RedisBackend, ResilientBackend, StoreBackend};
use tracing::info;

/// Connect to the configured Redis server and wrap it in the retry policy.
///
/// Fails with a configuration error when no Redis URL is configured, and
/// with an unavailable-store error when the server cannot be reached.
pub async fn open_redis_store(config: &EngineConfig) -> SamstoResult<ResilientBackend<RedisBackend>> {
    let url = config
        .redis_url
        .as_deref()
        .ok_or_else(|| ConfigError::InvalidValue {
            field: "SAMSTO_REDIS_URL".to_string(),
            value: String::new(),
            reason: "required for the Redis store".to_string(),
        })?;
    let backend = ResilientBackend::new(RedisBackend::connect(url).await?, config.retry.clone());
    backend.ping().await?;
    info!(
        timeout_ms = config.retry.timeout.as_millis() as u64,
        attempts = config.retry.attempts,
        "Redis sample store ready"
    );
    Ok(backend)
}

/// An in-process store under the configured retry policy.
pub fn in_memory_store(config: &EngineConfig) -> ResilientBackend<InMemoryBackend> {
    ResilientBackend::new(InMemoryBackend::new(), config.retry.clone())
}
