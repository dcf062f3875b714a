//! Aspect threshold configuration.
//!
//! An aspect defines up to four inclusive ranges, one per status band.
//! Either bound of a range may be open. Ranges may overlap: classification
//! tests them in severity order and the first match wins, so an overlap is
//! always resolved toward the more severe band.

use crate::Status;
use serde::{Deserialize, Serialize};

/// Inclusive numeric range. `None` means the bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[Option<f64>; 2]", into = "[Option<f64>; 2]")]
pub struct StatusRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl StatusRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

impl From<[Option<f64>; 2]> for StatusRange {
    fn from(bounds: [Option<f64>; 2]) -> Self {
        Self {
            min: bounds[0],
            max: bounds[1],
        }
    }
}

impl From<StatusRange> for [Option<f64>; 2] {
    fn from(range: StatusRange) -> Self {
        [range.min, range.max]
    }
}

/// Which end of the scale is bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdDirection {
    /// Values at or above a cut-off fall into that cut-off's band.
    HigherIsWorse,
    /// Values at or below a cut-off fall into that cut-off's band.
    LowerIsWorse,
}

/// Cut-off values for [`Thresholds::from_cutoffs`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cutoffs {
    pub critical: Option<f64>,
    pub warning: Option<f64>,
    pub info: Option<f64>,
}

/// Threshold bands of an aspect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    #[serde(default, rename = "criticalRange")]
    pub critical: Option<StatusRange>,
    #[serde(default, rename = "warningRange")]
    pub warning: Option<StatusRange>,
    #[serde(default, rename = "infoRange")]
    pub info: Option<StatusRange>,
    #[serde(default, rename = "okRange")]
    pub ok: Option<StatusRange>,
}

impl Thresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_critical(mut self, range: StatusRange) -> Self {
        self.critical = Some(range);
        self
    }

    pub fn with_warning(mut self, range: StatusRange) -> Self {
        self.warning = Some(range);
        self
    }

    pub fn with_info(mut self, range: StatusRange) -> Self {
        self.info = Some(range);
        self
    }

    pub fn with_ok(mut self, range: StatusRange) -> Self {
        self.ok = Some(range);
        self
    }

    /// Build bands from cut-off values and a comparison direction.
    ///
    /// Every finite value lands in some band: the OK band covers everything
    /// on the good side of the least severe cut-off.
    pub fn from_cutoffs(direction: ThresholdDirection, cutoffs: Cutoffs) -> Self {
        let band = |cutoff: Option<f64>| {
            cutoff.map(|c| match direction {
                ThresholdDirection::HigherIsWorse => StatusRange::at_least(c),
                ThresholdDirection::LowerIsWorse => StatusRange::at_most(c),
            })
        };
        let present = [cutoffs.critical, cutoffs.warning, cutoffs.info];
        let ok = match direction {
            ThresholdDirection::HigherIsWorse => present
                .iter()
                .flatten()
                .copied()
                .reduce(f64::min)
                .map(StatusRange::at_most),
            ThresholdDirection::LowerIsWorse => present
                .iter()
                .flatten()
                .copied()
                .reduce(f64::max)
                .map(StatusRange::at_least),
        }
        .unwrap_or_else(StatusRange::unbounded);

        Self {
            critical: band(cutoffs.critical),
            warning: band(cutoffs.warning),
            info: band(cutoffs.info),
            ok: Some(ok),
        }
    }

    /// The range configured for a band, if any.
    pub fn range_for(&self, status: Status) -> Option<&StatusRange> {
        match status {
            Status::Critical => self.critical.as_ref(),
            Status::Warning => self.warning.as_ref(),
            Status::Info => self.info.as_ref(),
            Status::Ok => self.ok.as_ref(),
            Status::Invalid => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.critical.is_none() && self.warning.is_none() && self.info.is_none() && self.ok.is_none()
    }
}
