//! Broker contract and the in-process broadcast broker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Errors a broker can report for a single send.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Broker unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Broker rejected message for {key}: {reason}")]
    Rejected { key: String, reason: String },
}

/// One message addressed to a topic partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerMessage {
    pub topic: String,
    pub partition: i32,
    /// Sample name the message describes.
    pub key: String,
    /// JSON-serialized sample.
    pub value: String,
}

impl BrokerMessage {
    /// The `{key, value}` body delivered to consumers.
    pub fn payload(&self) -> WirePayload {
        WirePayload {
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }
}

/// Message body as seen by consumers of the topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePayload {
    pub key: String,
    pub value: String,
}

/// Message bus transport.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn send(&self, message: BrokerMessage) -> Result<(), BrokerError>;
}

/// Fans messages out to in-process subscribers.
///
/// Subscribers that fall more than `capacity` messages behind miss the
/// oldest ones. Sending with no subscribers succeeds and drops the message.
#[derive(Debug, Clone)]
pub struct BroadcastBroker {
    tx: broadcast::Sender<WirePayload>,
}

impl BroadcastBroker {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WirePayload> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl BrokerClient for BroadcastBroker {
    async fn send(&self, message: BrokerMessage) -> Result<(), BrokerError> {
        match self.tx.send(message.payload()) {
            Ok(receivers) => {
                debug!(
                    topic = %message.topic,
                    key = %message.key,
                    receivers = receivers,
                    "Broadcast sample change"
                );
            }
            Err(_) => {
                debug!(topic = %message.topic, key = %message.key, "No subscribers for sample change");
            }
        }
        Ok(())
    }
}
