//! Timeout and retry decorator for any [`StoreBackend`].
//!
//! Each operation runs under `RetryPolicy::timeout`. Expiry and
//! unavailable-store errors are retried with exponential backoff up to
//! `RetryPolicy::attempts` times; every other error is returned at once.
//! All backend operations are idempotent, so a retried write that had in
//! fact landed is harmless.

use super::{FieldMap, StoreBackend};
use async_trait::async_trait;
use samsto_core::{SamstoResult, StoreError};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Timeout and retry settings for store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deadline for a single attempt.
    pub timeout: Duration,
    /// Total attempts, including the first. Zero behaves like one.
    pub attempts: u32,
    /// Delay before the first retry; doubled after each retry.
    pub backoff: Duration,
    /// Upper bound for the backoff delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            attempts: 3,
            backoff: Duration::from_millis(20),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }
}

/// Wraps a backend with per-operation timeouts and bounded retries.
#[derive(Debug)]
pub struct ResilientBackend<B> {
    inner: B,
    policy: RetryPolicy,
}

impl<B: StoreBackend> ResilientBackend<B> {
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> SamstoResult<T>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = SamstoResult<T>> + Send,
    {
        let attempts = self.policy.attempts.max(1);
        let mut delay = self.policy.backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match timeout(self.policy.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout {
                    operation: operation.to_string(),
                    after: self.policy.timeout,
                }
                .into()),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    debug!(
                        operation = operation,
                        attempt = attempt,
                        error = %e,
                        "Retrying cache store operation"
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(self.policy.max_backoff);
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(
                            operation = operation,
                            attempts = attempt,
                            error = %e,
                            "Cache store operation failed after retries"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl<B: StoreBackend> StoreBackend for ResilientBackend<B> {
    async fn hash_get(&self, key: &str) -> SamstoResult<Option<FieldMap>> {
        self.run("hash_get", || self.inner.hash_get(key)).await
    }

    async fn hash_replace(&self, key: &str, fields: &FieldMap) -> SamstoResult<()> {
        self.run("hash_replace", || self.inner.hash_replace(key, fields))
            .await
    }

    async fn set_add(&self, key: &str, member: &str) -> SamstoResult<bool> {
        self.run("set_add", || self.inner.set_add(key, member)).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> SamstoResult<bool> {
        self.run("set_remove", || self.inner.set_remove(key, member))
            .await
    }

    async fn set_members(&self, key: &str) -> SamstoResult<Vec<String>> {
        self.run("set_members", || self.inner.set_members(key)).await
    }

    async fn set_contains(&self, key: &str, member: &str) -> SamstoResult<bool> {
        self.run("set_contains", || self.inner.set_contains(key, member))
            .await
    }

    async fn set_len(&self, key: &str) -> SamstoResult<u64> {
        self.run("set_len", || self.inner.set_len(key)).await
    }

    async fn delete(&self, keys: &[String]) -> SamstoResult<u64> {
        self.run("delete", || self.inner.delete(keys)).await
    }

    async fn scan_prefix(&self, prefix: &str) -> SamstoResult<Vec<String>> {
        self.run("scan_prefix", || self.inner.scan_prefix(prefix)).await
    }

    async fn ping(&self) -> SamstoResult<()> {
        self.run("ping", || self.inner.ping()).await
    }
}
