//! Engine Configuration Module
//!
//! Configuration is loaded from environment variables with defaults suited
//! to development.

use samsto_core::ConfigError;
use samsto_events::NotifierConfig;
use samsto_storage::RetryPolicy;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Engine configuration: store connection, retries, write serialization
/// and change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Redis connection URL. `None` leaves the backend choice to the caller.
    pub redis_url: Option<String>,

    /// Timeout and retry policy for store operations.
    pub retry: RetryPolicy,

    /// Serialize upserts to the same sample within this process.
    pub serialize_same_key: bool,

    pub notifier: NotifierConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            retry: RetryPolicy::default(),
            serialize_same_key: true,
            notifier: NotifierConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create EngineConfig from environment variables.
    ///
    /// Unparsable values are logged and replaced by their defaults.
    ///
    /// Environment variables:
    /// - `SAMSTO_REDIS_URL`: Redis URL (default: unset)
    /// - `SAMSTO_STORE_TIMEOUT_MS`: Per-operation timeout (default: 500)
    /// - `SAMSTO_STORE_RETRY_ATTEMPTS`: Attempts per operation (default: 3)
    /// - `SAMSTO_STORE_RETRY_BACKOFF_MS`: Initial retry backoff (default: 20)
    /// - `SAMSTO_SERIALIZE_SAME_KEY`: "true" or "false" (default: true)
    /// - `SAMSTO_NOTIFIER_TOPIC`: Broker topic (default: perspectives)
    /// - `SAMSTO_NOTIFIER_PARTITION`: Broker partition (default: 0)
    /// - `SAMSTO_NOTIFIER_CAPACITY`: Notifier queue depth (default: 1024)
    pub fn from_env() -> Self {
        // Lenient loading never fails
        Self::load(|name| std::env::var(name).ok(), false).unwrap_or_default()
    }

    /// Like [`EngineConfig::from_env`], but rejects unparsable values.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::load(|name| std::env::var(name).ok(), true)
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::load(lookup, true)
    }

    fn load<F>(lookup: F, strict: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let timeout_ms: Option<u64> = parse_var(&var, "SAMSTO_STORE_TIMEOUT_MS", strict)?;
        let attempts: Option<u32> = parse_var(&var, "SAMSTO_STORE_RETRY_ATTEMPTS", strict)?;
        let backoff_ms: Option<u64> = parse_var(&var, "SAMSTO_STORE_RETRY_BACKOFF_MS", strict)?;
        let serialize = parse_bool(&var, "SAMSTO_SERIALIZE_SAME_KEY", strict)?;
        let partition: Option<i32> = parse_var(&var, "SAMSTO_NOTIFIER_PARTITION", strict)?;
        let capacity: Option<usize> = parse_var(&var, "SAMSTO_NOTIFIER_CAPACITY", strict)?;

        if let Some(0) = capacity {
            let err = invalid("SAMSTO_NOTIFIER_CAPACITY", "0", "must be at least 1");
            if strict {
                return Err(err);
            }
            warn!(error = %err, "Ignoring invalid configuration value");
        }

        let mut retry = defaults.retry;
        if let Some(ms) = timeout_ms {
            retry = retry.with_timeout(Duration::from_millis(ms));
        }
        if let Some(attempts) = attempts {
            retry = retry.with_attempts(attempts);
        }
        if let Some(ms) = backoff_ms {
            retry = retry.with_backoff(Duration::from_millis(ms));
        }

        let mut notifier = defaults.notifier;
        if let Some(topic) = var("SAMSTO_NOTIFIER_TOPIC") {
            notifier = notifier.with_topic(topic.trim());
        }
        if let Some(partition) = partition {
            notifier = notifier.with_partition(partition);
        }
        if let Some(capacity) = capacity.filter(|c| *c > 0) {
            notifier = notifier.with_capacity(capacity);
        }

        Ok(Self {
            redis_url: var("SAMSTO_REDIS_URL").map(|s| s.trim().to_string()),
            retry,
            serialize_same_key: serialize.unwrap_or(defaults.serialize_same_key),
            notifier,
        })
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_serialize_same_key(mut self, enabled: bool) -> Self {
        self.serialize_same_key = enabled;
        self
    }

    pub fn with_notifier(mut self, notifier: NotifierConfig) -> Self {
        self.notifier = notifier;
        self
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<T, F>(var: &F, name: &str, strict: bool) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(name) else {
        return Ok(None);
    };
    match raw.trim().parse::<T>() {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            let err = invalid(name, &raw, &e.to_string());
            if strict {
                Err(err)
            } else {
                warn!(error = %err, "Ignoring invalid configuration value");
                Ok(None)
            }
        }
    }
}

fn parse_bool<F>(var: &F, name: &str, strict: bool) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(name) else {
        return Ok(None);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(Some(true)),
        "false" | "0" | "no" => Ok(Some(false)),
        _ => {
            let err = invalid(name, &raw, "expected true or false");
            if strict {
                Err(err)
            } else {
                warn!(error = %err, "Ignoring invalid configuration value");
                Ok(None)
            }
        }
    }
}
