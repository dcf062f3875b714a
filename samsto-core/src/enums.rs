//! Enum types for SAMSTO entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// SAMPLE STATUS
// ============================================================================

/// Status of a sample, as computed from its value and the aspect thresholds.
///
/// Variants are declared in descending severity for the numeric bands;
/// `Invalid` is reserved for values that cannot be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Status {
    #[default]
    Invalid,
    Critical,
    Warning,
    Info,
    #[serde(rename = "OK")]
    Ok,
}

impl Status {
    /// Bands in the order they are tested during classification.
    pub const SEVERITY_ORDER: [Status; 4] =
        [Status::Critical, Status::Warning, Status::Info, Status::Ok];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Invalid => "Invalid",
            Status::Critical => "Critical",
            Status::Warning => "Warning",
            Status::Info => "Info",
            Status::Ok => "OK",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invalid" => Ok(Status::Invalid),
            "critical" => Ok(Status::Critical),
            "warning" => Ok(Status::Warning),
            "info" => Ok(Status::Info),
            "ok" => Ok(Status::Ok),
            _ => Err(format!("Invalid Status: {}", s)),
        }
    }
}

// ============================================================================
// OBJECT TYPE
// ============================================================================

/// Object type tag used by the key codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Subject,
    Aspect,
    Sample,
}

impl ObjectType {
    pub fn tag(&self) -> &'static str {
        match self {
            ObjectType::Subject => "subject",
            ObjectType::Aspect => "aspect",
            ObjectType::Sample => "sample",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subject" => Ok(ObjectType::Subject),
            "aspect" => Ok(ObjectType::Aspect),
            "sample" => Ok(ObjectType::Sample),
            _ => Err(format!("Invalid ObjectType: {}", s)),
        }
    }
}
