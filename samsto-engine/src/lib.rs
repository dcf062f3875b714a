//! SAMSTO Engine - Sample Store Cache Engine
//!
//! The request-facing surface of the sample store. [`SampleEngine`]
//! validates sample upserts against the mirrored subjects and aspects,
//! computes status transitions, keeps the index sets in step with the
//! sample hashes and hands each stored sample to the change notifier.
//!
//! ## Example
//!
//! ```ignore
//! use samsto_engine::{store, EngineConfig, SampleEngine, UpsertRequest};
//! use samsto_events::BroadcastBroker;
//! use samsto_storage::InMemoryRelationalStore;
//! use std::sync::Arc;
//!
//! let config = EngineConfig::from_env();
//! let backend = Arc::new(store::in_memory_store(&config));
//! let source = Arc::new(InMemoryRelationalStore::new());
//! let broker = Arc::new(BroadcastBroker::new(1024));
//!
//! let engine = SampleEngine::from_config(backend, source, broker, &config);
//! engine.init().await?;
//! let sample = engine.upsert(UpsertRequest::new("NA.US|Temp", "25")).await?;
//! ```

pub mod config;
pub mod engine;
pub mod locks;
pub mod request;
pub mod store;
pub mod telemetry;

pub use config::EngineConfig;
pub use engine::SampleEngine;
pub use locks::{KeyGuard, KeyedLocks};
pub use request::UpsertRequest;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
