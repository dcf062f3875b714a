//! Composite sample names: `<subjectAbsolutePath>|<aspectName>`.

use crate::ValidationError;
use std::fmt;
use std::str::FromStr;

/// Delimiter between the subject path and the aspect name.
pub const SAMPLE_NAME_SEPARATOR: char = '|';

/// A parsed composite sample name. Casing is kept exactly as supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleName {
    subject_path: String,
    aspect_name: String,
}

impl SampleName {
    /// Parse a composite name. Exactly one separator with non-empty sides is
    /// required.
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "name".to_string(),
            });
        }

        let mut parts = name.split(SAMPLE_NAME_SEPARATOR);
        let (Some(subject_path), Some(aspect_name), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed(name, "expected exactly one '|' separator"));
        };

        if subject_path.is_empty() {
            return Err(malformed(name, "subject path is empty"));
        }
        if aspect_name.is_empty() {
            return Err(malformed(name, "aspect name is empty"));
        }

        Ok(Self {
            subject_path: subject_path.to_string(),
            aspect_name: aspect_name.to_string(),
        })
    }

    pub fn new(subject_path: impl Into<String>, aspect_name: impl Into<String>) -> Self {
        Self {
            subject_path: subject_path.into(),
            aspect_name: aspect_name.into(),
        }
    }

    /// Join a subject path and aspect name into a composite name.
    pub fn compose(subject_path: &str, aspect_name: &str) -> String {
        format!("{}{}{}", subject_path, SAMPLE_NAME_SEPARATOR, aspect_name)
    }

    pub fn subject_path(&self) -> &str {
        &self.subject_path
    }

    pub fn aspect_name(&self) -> &str {
        &self.aspect_name
    }
}

fn malformed(name: &str, reason: &str) -> ValidationError {
    ValidationError::MalformedSampleName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for SampleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.subject_path, SAMPLE_NAME_SEPARATOR, self.aspect_name)
    }
}

impl FromStr for SampleName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
