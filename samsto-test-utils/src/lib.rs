//! SAMSTO Test Utilities
//!
//! Centralized test infrastructure for the SAMSTO workspace:
//! - Mock brokers and relational sources
//! - Proptest generators for entity types
//! - Fixtures for the usual subject/aspect layouts
//! - Assertions for SAMSTO error variants

pub use samsto_storage::{InMemoryBackend, InMemoryRelationalStore};

pub use samsto_core::{
    Aspect, Cutoffs, EntityId, NotFoundError, RelatedLink, Sample, SamstoError, SamstoResult,
    SourceError, Status, StatusRange, Subject, ThresholdDirection, Thresholds, UserProfile,
    UserSummary, ValidationError,
};

use async_trait::async_trait;
use samsto_events::{BrokerClient, BrokerError, BrokerMessage};
use samsto_storage::RelationalSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

// ============================================================================
// MOCK BROKERS
// ============================================================================

/// Broker that keeps every message it is sent.
#[derive(Debug, Default)]
pub struct RecordingBroker {
    messages: Mutex<Vec<BrokerMessage>>,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far, in order.
    pub fn messages(&self) -> Vec<BrokerMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BrokerClient for RecordingBroker {
    async fn send(&self, message: BrokerMessage) -> Result<(), BrokerError> {
        self.messages
            .lock()
            .map_err(|_| BrokerError::Unavailable {
                reason: "recorder poisoned".to_string(),
            })?
            .push(message);
        Ok(())
    }
}

/// Broker that rejects every message.
#[derive(Debug, Default)]
pub struct FailingBroker {
    attempts: AtomicU64,
}

impl FailingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerClient for FailingBroker {
    async fn send(&self, _message: BrokerMessage) -> Result<(), BrokerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(BrokerError::Unavailable {
            reason: "broker offline".to_string(),
        })
    }
}

// ============================================================================
// MOCK RELATIONAL SOURCE
// ============================================================================

/// Relational source whose every query fails as unavailable.
#[derive(Debug, Default)]
pub struct FailingRelationalSource;

fn source_down<T>() -> SamstoResult<T> {
    Err(SourceError::Unavailable {
        reason: "relational store offline".to_string(),
    }
    .into())
}

#[async_trait]
impl RelationalSource for FailingRelationalSource {
    async fn list_subjects(&self) -> SamstoResult<Vec<Subject>> {
        source_down()
    }

    async fn list_aspects(&self) -> SamstoResult<Vec<Aspect>> {
        source_down()
    }

    async fn find_subject_by_absolute_path(&self, _path: &str) -> SamstoResult<Option<Subject>> {
        source_down()
    }

    async fn find_aspect_by_name(&self, _name: &str) -> SamstoResult<Option<Aspect>> {
        source_down()
    }

    async fn find_user(&self, _id: EntityId) -> SamstoResult<Option<UserSummary>> {
        source_down()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating SAMSTO entity types.

    use super::*;
    use proptest::prelude::*;

    /// A finite value in a range thresholds usually cover.
    pub fn arb_numeric_value() -> impl Strategy<Value = f64> {
        -1000.0f64..1000.0
    }

    /// A range with either bound possibly open and `min <= max`.
    pub fn arb_status_range() -> impl Strategy<Value = StatusRange> {
        (
            proptest::option::of(-1000.0f64..1000.0),
            proptest::option::of(-1000.0f64..1000.0),
        )
            .prop_map(|(a, b)| match (a, b) {
                (Some(a), Some(b)) if a > b => StatusRange {
                    min: Some(b),
                    max: Some(a),
                },
                (min, max) => StatusRange { min, max },
            })
    }

    pub fn arb_thresholds() -> impl Strategy<Value = Thresholds> {
        (
            proptest::option::of(arb_status_range()),
            proptest::option::of(arb_status_range()),
            proptest::option::of(arb_status_range()),
            proptest::option::of(arb_status_range()),
        )
            .prop_map(|(critical, warning, info, ok)| Thresholds {
                critical,
                warning,
                info,
                ok,
            })
    }

    /// A dot-separated subject path, mixed case.
    pub fn arb_subject_path() -> impl Strategy<Value = String> {
        prop::collection::vec("[A-Za-z][A-Za-z0-9_-]{0,8}", 1..4).prop_map(|parts| parts.join("."))
    }

    pub fn arb_aspect_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9_-]{0,15}"
    }

    pub fn arb_related_link() -> impl Strategy<Value = RelatedLink> {
        ("[a-z]{1,6}", "[a-z]{1,10}")
            .prop_map(|(name, host)| RelatedLink::new(name, format!("https://{}.example", host)))
    }

    pub fn arb_related_links() -> impl Strategy<Value = Vec<RelatedLink>> {
        prop::collection::vec(arb_related_link(), 0..5)
    }

    pub fn arb_subject() -> impl Strategy<Value = Subject> {
        (arb_subject_path(), any::<bool>())
            .prop_map(|(path, published)| Subject::new(path).with_published(published))
    }

    pub fn arb_aspect() -> impl Strategy<Value = Aspect> {
        (arb_aspect_name(), arb_thresholds(), any::<bool>()).prop_map(
            |(name, thresholds, published)| Aspect::new(name, thresholds).with_published(published),
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// `Temp`: OK up to 30, Warning from 30, Critical from 90.
    pub fn temperature_aspect() -> Aspect {
        Aspect::new(
            "Temp",
            Thresholds::from_cutoffs(
                ThresholdDirection::HigherIsWorse,
                Cutoffs {
                    critical: Some(90.0),
                    warning: Some(30.0),
                    info: None,
                },
            ),
        )
    }

    /// Classic integer bands: Critical 0-1, Warning 2, Info 3, OK 4.
    pub fn banded_aspect(name: &str) -> Aspect {
        Aspect::new(
            name,
            Thresholds::new()
                .with_critical(StatusRange::new(0.0, 1.0))
                .with_warning(StatusRange::new(2.0, 2.0))
                .with_info(StatusRange::new(3.0, 3.0))
                .with_ok(StatusRange::new(4.0, 4.0)),
        )
    }

    pub fn published_subject(path: &str) -> Subject {
        Subject::new(path)
    }

    pub fn unpublished_subject(path: &str) -> Subject {
        Subject::new(path).with_published(false)
    }

    pub fn test_user() -> UserSummary {
        UserSummary {
            id: samsto_core::new_entity_id(),
            name: "testuser@refocus.com".to_string(),
            email: "testuser@refocus.com".to_string(),
            profile: UserProfile {
                name: "Admin".to_string(),
            },
        }
    }

    /// Relational store holding `NA`, `NA.US` and the `Temp` aspect.
    pub fn north_america_source() -> SamstoResult<InMemoryRelationalStore> {
        let source = InMemoryRelationalStore::new();
        source.upsert_subject(published_subject("NA"))?;
        source.upsert_subject(published_subject("NA.US"))?;
        source.upsert_aspect(temperature_aspect())?;
        Ok(source)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for SAMSTO error variants.

    use super::*;

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &SamstoResult<T>, expected: NotFoundError) {
        match result {
            Err(SamstoError::NotFound(found)) => assert_eq!(*found, expected),
            other => panic!("Expected NotFound({:?}), got: {:?}", expected, other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &SamstoResult<T>) {
        match result {
            Err(SamstoError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_source_error<T: std::fmt::Debug>(result: &SamstoResult<T>) {
        match result {
            Err(SamstoError::Source(_)) => {}
            other => panic!("Expected Source error, got: {:?}", other),
        }
    }
}
