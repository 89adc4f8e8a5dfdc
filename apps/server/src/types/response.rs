// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response types for the API.

use covclean_processing::{CleaningParameters, MergeStrategy};
use serde::Serialize;

/// Result of a clean request. Unchanged features are not echoed back.
#[derive(Debug, Clone, Serialize)]
pub struct CleanResponse {
    /// Number of features submitted.
    pub total: usize,
    /// Number of features whose geometry changed.
    pub changed_count: usize,
    /// Changed features in submission order.
    pub changed: Vec<ChangedFeature>,
    pub stats: CleanStats,
}

/// A feature whose geometry the engine modified.
#[derive(Debug, Clone, Serialize)]
pub struct ChangedFeature {
    pub id: i64,
    /// Lowercase hex WKB, little-endian, without SRID.
    pub geometry: String,
}

/// Processing statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanStats {
    /// Time spent decoding the submitted geometries (ms).
    pub decode_time_ms: u64,
    /// Total processing time (ms).
    pub elapsed_ms: u64,
}

/// Effective cleaning defaults.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsResponse {
    pub parameters: CleaningParameters,
    pub merge_strategies: Vec<&'static str>,
    pub verbose_logging: bool,
    pub statement_timeout_secs: u64,
    pub max_features: usize,
}

impl SettingsResponse {
    pub fn strategies() -> Vec<&'static str> {
        MergeStrategy::ALL.iter().map(|s| s.as_str()).collect()
    }
}
