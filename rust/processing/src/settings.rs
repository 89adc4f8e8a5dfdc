// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persisted cleaning settings, loaded from environment variables.

use std::time::Duration;

use serde::Serialize;

use crate::params::{CleaningParameters, MergeStrategy, SnappingDistance};

/// Cleaning settings. Read once, then passed by reference into each call.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Postgres connection URL of the PostGIS instance doing the cleaning.
    #[serde(skip_serializing)]
    pub service_endpoint: String,
    /// Default parameters for requests that don't override them.
    pub parameters: CleaningParameters,
    /// Log per-feature and per-row detail at info instead of debug.
    pub verbose_logging: bool,
    /// Upper bound on the staging and cleaning statements, in seconds.
    pub statement_timeout_secs: u64,
    /// Upper bound on getting a pooled connection, in seconds.
    pub connect_timeout_secs: u64,
    /// Connection pool size.
    pub max_connections: u32,
}

impl Settings {
    /// Load settings from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup. Missing or malformed
    /// values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = CleaningParameters::default();

        let gap_tolerance = lookup("COVCLEAN_GAP_TOLERANCE")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(defaults.gap_tolerance);

        let snapping = lookup("COVCLEAN_SNAPPING_DISTANCE")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .and_then(|v| SnappingDistance::from_f64(v).ok())
            .unwrap_or(defaults.snapping);

        let merge_strategy = lookup("COVCLEAN_MERGE_STRATEGY")
            .and_then(|v| v.parse::<MergeStrategy>().ok())
            .unwrap_or(defaults.merge_strategy);

        Self {
            service_endpoint: lookup("COVCLEAN_SERVICE_ENDPOINT")
                .or_else(|| lookup("DATABASE_URL"))
                .unwrap_or_else(|| "postgres://localhost/postgres".into()),
            parameters: CleaningParameters {
                gap_tolerance,
                snapping,
                merge_strategy,
            },
            verbose_logging: lookup("COVCLEAN_VERBOSE_LOGGING")
                .map(|v| parse_bool(&v).unwrap_or(true))
                .unwrap_or(true),
            statement_timeout_secs: lookup("COVCLEAN_STATEMENT_TIMEOUT_SECS")
                .unwrap_or_else(|| "120".into())
                .parse()
                .unwrap_or(120),
            connect_timeout_secs: lookup("COVCLEAN_CONNECT_TIMEOUT_SECS")
                .unwrap_or_else(|| "10".into())
                .parse()
                .unwrap_or(10),
            max_connections: lookup("COVCLEAN_MAX_CONNECTIONS")
                .unwrap_or_else(|| "4".into())
                .parse()
                .unwrap_or(4),
        }
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
