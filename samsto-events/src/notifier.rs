//! Best-effort change notifier.
//!
//! `notify` frames the sample and pushes it onto a bounded queue without
//! waiting. A publisher task drains the queue into the broker. A full queue,
//! a serialization problem or a broker failure is logged and counted; none
//! of them reaches the caller.

use crate::broker::{BrokerClient, BrokerMessage};
use samsto_core::Sample;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Topic the original producer publishes sample changes to.
pub const DEFAULT_TOPIC: &str = "perspectives";
pub const DEFAULT_PARTITION: i32 = 0;
pub const DEFAULT_CAPACITY: usize = 1024;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    pub topic: String,
    pub partition: i32,
    /// Queue depth before new notifications are dropped.
    pub capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            partition: DEFAULT_PARTITION,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl NotifierConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
struct NotifierMetrics {
    enqueued: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl NotifierMetrics {
    fn snapshot(&self) -> NotifierStats {
        NotifierStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Notifier counters at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifierStats {
    /// Accepted onto the queue.
    pub enqueued: u64,
    /// Delivered to the broker.
    pub published: u64,
    /// Rejected because the queue was full or closed.
    pub dropped: u64,
    /// Failed to serialize or rejected by the broker.
    pub failed: u64,
}

// ============================================================================
// NOTIFIER
// ============================================================================

pub struct ChangeNotifier {
    tx: mpsc::Sender<BrokerMessage>,
    config: NotifierConfig,
    metrics: Arc<NotifierMetrics>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ChangeNotifier {
    /// Start the publisher task on the current runtime.
    pub fn spawn<K>(broker: Arc<K>, config: NotifierConfig) -> Self
    where
        K: BrokerClient + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(NotifierMetrics::default());
        let task = tokio::spawn(publish_loop(broker, rx, shutdown_rx, Arc::clone(&metrics)));
        info!(
            topic = %config.topic,
            partition = config.partition,
            capacity = config.capacity,
            "Change notifier started"
        );
        Self {
            tx,
            config,
            metrics,
            shutdown_tx,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn stats(&self) -> NotifierStats {
        self.metrics.snapshot()
    }

    /// Queue a sample for publication. Never blocks and never fails.
    pub fn notify(&self, sample: &Sample) {
        let value = match serde_json::to_string(sample) {
            Ok(value) => value,
            Err(e) => {
                self.metrics.failed.fetch_add(1, Ordering::Relaxed);
                warn!(key = %sample.name, error = %e, "Failed to serialize sample change");
                return;
            }
        };
        let message = BrokerMessage {
            topic: self.config.topic.clone(),
            partition: self.config.partition,
            key: sample.name.clone(),
            value,
        };
        match self.tx.try_send(message) {
            Ok(()) => {
                self.metrics.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(key = %message.key, "Notifier queue full, dropping sample change");
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(key = %message.key, "Notifier stopped, dropping sample change");
            }
        }
    }

    /// Stop accepting notifications and wait for the queue to drain.
    ///
    /// Calling it more than once is harmless.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Notifier publisher task ended abnormally");
            }
            let stats = self.stats();
            info!(
                published = stats.published,
                dropped = stats.dropped,
                failed = stats.failed,
                "Change notifier stopped"
            );
        }
    }
}

async fn publish_loop<K>(
    broker: Arc<K>,
    mut rx: mpsc::Receiver<BrokerMessage>,
    mut shutdown_rx: watch::Receiver<bool>,
    metrics: Arc<NotifierMetrics>,
) where
    K: BrokerClient + ?Sized,
{
    loop {
        tokio::select! {
            biased;

            message = rx.recv() => match message {
                Some(message) => publish(broker.as_ref(), message, &metrics).await,
                None => break,
            },

            _ = shutdown_rx.changed() => {
                rx.close();
                while let Some(message) = rx.recv().await {
                    publish(broker.as_ref(), message, &metrics).await;
                }
                break;
            }
        }
    }
}

async fn publish<K>(broker: &K, message: BrokerMessage, metrics: &NotifierMetrics)
where
    K: BrokerClient + ?Sized,
{
    let key = message.key.clone();
    match broker.send(message).await {
        Ok(()) => {
            metrics.published.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Published sample change");
        }
        Err(e) => {
            metrics.failed.fetch_add(1, Ordering::Relaxed);
            warn!(key = %key, error = %e, "Failed to publish sample change");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerError;
    use async_trait::async_trait;
    use chrono::Utc;
    use samsto_core::Status;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        messages: StdMutex<Vec<BrokerMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl BrokerClient for Recorder {
        async fn send(&self, message: BrokerMessage) -> Result<(), BrokerError> {
            if self.fail {
                return Err(BrokerError::Unavailable {
                    reason: "down".to_string(),
                });
            }
            self.messages.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn sample(name: &str) -> Sample {
        let now = Utc::now();
        Sample {
            name: name.to_string(),
            value: "1".to_string(),
            status: Status::Critical,
            previous_status: Status::Invalid,
            status_changed_at: now,
            subject_id: samsto_core::new_entity_id(),
            aspect_id: samsto_core::new_entity_id(),
            related_links: vec![],
            provider: None,
            user: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_messages_are_framed_and_published() {
        let broker = Arc::new(Recorder::default());
        let notifier = ChangeNotifier::spawn(Arc::clone(&broker), NotifierConfig::default());

        notifier.notify(&sample("NA.US|Temp"));
        notifier.shutdown().await;

        let messages = broker.messages.lock().unwrap().clone();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "perspectives");
        assert_eq!(messages[0].partition, 0);
        assert_eq!(messages[0].key, "NA.US|Temp");

        let value: serde_json::Value = serde_json::from_str(&messages[0].value).unwrap();
        assert_eq!(value["name"], "NA.US|Temp");
        assert_eq!(value["status"], "Critical");

        let stats = notifier.stats();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.published, 1);
    }

    #[tokio::test]
    async fn test_broker_failures_are_counted() {
        let broker = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let notifier = ChangeNotifier::spawn(broker, NotifierConfig::default());
        notifier.notify(&sample("a|b"));
        notifier.notify(&sample("a|c"));
        notifier.shutdown().await;

        let stats = notifier.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.published, 0);
    }

    #[tokio::test]
    async fn test_notify_after_shutdown_is_dropped() {
        let broker = Arc::new(Recorder::default());
        let notifier = ChangeNotifier::spawn(Arc::clone(&broker), NotifierConfig::default());
        notifier.shutdown().await;
        notifier.shutdown().await;

        notifier.notify(&sample("a|b"));
        assert_eq!(notifier.stats().dropped, 1);
        assert!(broker.messages.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_full_queue_drops_without_blocking() {
        let broker = Arc::new(Recorder::default());
        let notifier = ChangeNotifier::spawn(
            Arc::clone(&broker),
            NotifierConfig::new().with_capacity(1),
        );
        // The publisher cannot run until this task yields
        notifier.notify(&sample("a|1"));
        notifier.notify(&sample("a|2"));
        notifier.notify(&sample("a|3"));
        assert_eq!(notifier.stats().dropped, 2);

        notifier.shutdown().await;
        assert_eq!(broker.messages.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_config_builder() {
        let config = NotifierConfig::new()
            .with_topic("samples")
            .with_partition(3)
            .with_capacity(8);
        assert_eq!(config.topic, "samples");
        assert_eq!(config.partition, 3);
        assert_eq!(config.capacity, 8);
    }
}
