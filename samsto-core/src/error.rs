//! Error types for SAMSTO operations

use std::time::Duration;
use thiserror::Error;

/// Client-input faults. Never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Malformed sample name {name:?}: {reason}")]
    MalformedSampleName { name: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Terminal not-found conditions.
///
/// Absent and unpublished objects produce the same variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("subject for this sample was not found or has isPublished=false")]
    Subject,

    #[error("aspect for this sample was not found or has isPublished=false")]
    Aspect,

    #[error("sample {name} was not found")]
    Sample { name: String },
}

/// Cache store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Cache store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache store operation {operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Failed to decode {key}: {reason}")]
    Decode { key: String, reason: String },

    #[error("Failed to encode {field} of {key}: {reason}")]
    Encode {
        key: String,
        field: String,
        reason: String,
    },

    #[error("Cache store lock poisoned")]
    LockPoisoned,
}

/// Errors raised by the authoritative relational store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Relational store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Relational query failed: {reason}")]
    Query { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all SAMSTO errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SamstoError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl SamstoError {
    /// Whether the failure is a transient infrastructure fault.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SamstoError::Store(StoreError::Unavailable { .. })
                | SamstoError::Store(StoreError::Timeout { .. })
                | SamstoError::Source(SourceError::Unavailable { .. })
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SamstoError::NotFound(_))
    }
}

/// Result type alias for SAMSTO operations.
pub type SamstoResult<T> = Result<T, SamstoError>;
