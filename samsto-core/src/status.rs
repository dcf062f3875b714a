//! Status state machine.
//!
//! Classification is a pure function of `(value, thresholds)`. The previous
//! status is carried along for display only and never feeds back into the
//! new status.

use crate::{Status, Thresholds};

/// Parse a sample value as a finite number.
pub fn parse_numeric(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Classify a raw sample value against an aspect's thresholds.
pub fn classify(value: &str, thresholds: &Thresholds) -> Status {
    let Some(number) = parse_numeric(value) else {
        return Status::Invalid;
    };

    Status::SEVERITY_ORDER
        .into_iter()
        .find(|band| {
            thresholds
                .range_for(*band)
                .is_some_and(|range| range.contains(number))
        })
        .unwrap_or(Status::Invalid)
}

/// Outcome of applying a new value to a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub status: Status,
    pub previous_status: Status,
    /// True on creation or when the status differs from the previous one.
    pub changed: bool,
}

/// Compute the new status and the status history entry for a sample.
pub fn transition(value: &str, thresholds: &Thresholds, previous: Option<Status>) -> StatusTransition {
    let status = classify(value, thresholds);
    let previous_status = previous.unwrap_or(Status::Invalid);
    StatusTransition {
        status,
        previous_status,
        changed: previous.is_none() || status != previous_status,
    }
}
