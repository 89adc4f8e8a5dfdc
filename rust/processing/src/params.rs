// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cleaning parameters passed verbatim to `ST_CoverageClean`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Rule deciding which polygon receives an overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStrategy {
    /// Neighbour sharing the longest common border (recommended)
    #[default]
    #[serde(alias = "MERGE_LONGEST_BORDER")]
    LongestBorder,
    #[serde(alias = "MERGE_MAX_AREA")]
    MaxArea,
    #[serde(alias = "MERGE_MIN_AREA")]
    MinArea,
    /// Neighbour with the smallest input index
    #[serde(alias = "MERGE_MIN_INDEX")]
    MinIndex,
}

impl MergeStrategy {
    pub const ALL: [MergeStrategy; 4] = [
        MergeStrategy::LongestBorder,
        MergeStrategy::MaxArea,
        MergeStrategy::MinArea,
        MergeStrategy::MinIndex,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::LongestBorder => "LONGEST_BORDER",
            MergeStrategy::MaxArea => "MAX_AREA",
            MergeStrategy::MinArea => "MIN_AREA",
            MergeStrategy::MinIndex => "MIN_INDEX",
        }
    }

    /// String literal understood by `ST_CoverageClean`.
    pub fn as_engine_literal(self) -> &'static str {
        match self {
            MergeStrategy::LongestBorder => "MERGE_LONGEST_BORDER",
            MergeStrategy::MaxArea => "MERGE_MAX_AREA",
            MergeStrategy::MinArea => "MERGE_MIN_AREA",
            MergeStrategy::MinIndex => "MERGE_MIN_INDEX",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let key = upper.strip_prefix("MERGE_").unwrap_or(&upper);
        MergeStrategy::ALL
            .into_iter()
            .find(|m| m.as_str() == key)
            .ok_or_else(|| {
                ValidationError::InvalidParameters(format!("unknown merge strategy '{s}'"))
            })
    }
}

/// Vertex snapping mode. On the wire this is a single number:
/// `-1` auto, `0` disabled, anything positive an explicit distance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum SnappingDistance {
    #[default]
    Auto,
    Disabled,
    Distance(f64),
}

impl SnappingDistance {
    pub fn from_f64(value: f64) -> Result<Self, ValidationError> {
        if value == -1.0 {
            Ok(SnappingDistance::Auto)
        } else if value == 0.0 {
            Ok(SnappingDistance::Disabled)
        } else if value.is_finite() && value > 0.0 {
            Ok(SnappingDistance::Distance(value))
        } else {
            Err(ValidationError::InvalidParameters(format!(
                "snapping distance must be -1 (auto), 0 (disabled) or positive, got {value}"
            )))
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            SnappingDistance::Auto => -1.0,
            SnappingDistance::Disabled => 0.0,
            SnappingDistance::Distance(d) => d,
        }
    }
}

impl TryFrom<f64> for SnappingDistance {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        SnappingDistance::from_f64(value)
    }
}

impl From<SnappingDistance> for f64 {
    fn from(snapping: SnappingDistance) -> Self {
        snapping.as_f64()
    }
}

/// Parameters for one cleaning call. Immutable for the duration of the call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleaningParameters {
    /// Maximum width of a gap that will be closed, in map units
    pub gap_tolerance: f64,
    #[serde(rename = "snapping_distance")]
    pub snapping: SnappingDistance,
    pub merge_strategy: MergeStrategy,
}

impl Default for CleaningParameters {
    fn default() -> Self {
        Self {
            gap_tolerance: 0.01,
            snapping: SnappingDistance::Auto,
            merge_strategy: MergeStrategy::LongestBorder,
        }
    }
}

impl CleaningParameters {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.gap_tolerance.is_finite() || self.gap_tolerance < 0.0 {
            return Err(ValidationError::InvalidParameters(format!(
                "gap tolerance must be a non-negative number, got {}",
                self.gap_tolerance
            )));
        }
        if let SnappingDistance::Distance(d) = self.snapping {
            if !d.is_finite() || d <= 0.0 {
                return Err(ValidationError::InvalidParameters(format!(
                    "explicit snapping distance must be positive, got {d}"
                )));
            }
        }
        Ok(())
    }
}

/// Per-request overrides layered over configured defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParameterOverrides {
    #[serde(default)]
    pub gap_tolerance: Option<f64>,
    #[serde(default)]
    pub snapping_distance: Option<f64>,
    #[serde(default)]
    pub merge_strategy: Option<MergeStrategy>,
}

impl ParameterOverrides {
    /// Merge onto `base` without touching it. The result is validated.
    pub fn apply(&self, base: &CleaningParameters) -> Result<CleaningParameters, ValidationError> {
        let params = CleaningParameters {
            gap_tolerance: self.gap_tolerance.unwrap_or(base.gap_tolerance),
            snapping: match self.snapping_distance {
                Some(value) => SnappingDistance::from_f64(value)?,
                None => base.snapping,
            },
            merge_strategy: self.merge_strategy.unwrap_or(base.merge_strategy),
        };
        params.validate()?;
        Ok(params)
    }
}
