//! SAMSTO Events - Change Notification
//!
//! Publishes every successfully upserted sample to a message broker topic.
//! Delivery is best effort: the engine hands samples to a
//! [`ChangeNotifier`], which queues them for a background publisher and
//! never reports failures back to the upsert path.
//!
//! Consumers receive `{key, value}` payloads where `key` is the sample name
//! and `value` is the JSON-serialized sample.

pub mod broker;
pub mod notifier;

pub use broker::{BroadcastBroker, BrokerClient, BrokerError, BrokerMessage, WirePayload};
pub use notifier::{
    ChangeNotifier, NotifierConfig, NotifierStats, DEFAULT_CAPACITY, DEFAULT_PARTITION,
    DEFAULT_TOPIC,
};
