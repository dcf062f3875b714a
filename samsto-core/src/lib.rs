//! SAMSTO Core - Entity Types
//!
//! Pure data structures and pure functions shared by every other crate:
//! mirrored Subjects and Aspects, Samples, the status classifier and the
//! error taxonomy. Nothing in this crate performs I/O.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod entities;
pub mod enums;
pub mod error;
pub mod name;
pub mod status;
pub mod thresholds;

pub use entities::{
    merge_related_links, Aspect, MirroredObject, RelatedLink, Sample, Subject, UserProfile,
    UserSummary,
};
pub use enums::{ObjectType, Status};
pub use error::{
    ConfigError, NotFoundError, SamstoError, SamstoResult, SourceError, StoreError,
    ValidationError,
};
pub use name::{SampleName, SAMPLE_NAME_SEPARATOR};
pub use status::{classify, parse_numeric, transition, StatusTransition};
pub use thresholds::{Cutoffs, StatusRange, ThresholdDirection, Thresholds};

/// Identifier of a row in the authoritative relational store.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}
