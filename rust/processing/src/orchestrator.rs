// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cleaning orchestrator: validate the selection, clean it as one batch,
//! and write back only the features whose geometry actually changed.

use std::sync::Arc;

use covclean_core::Geometry;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::channel;
use crate::engine::CoverageEngine;
use crate::error::{CleanError, TransferError, ValidationError};
use crate::params::CleaningParameters;
use crate::source::{Feature, FeatureId, FeatureSource};

/// Coverage cleaning needs at least two polygons to have any adjacency.
pub const MIN_FEATURES: usize = 2;

macro_rules! feature_log {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub total: usize,
    pub changed_count: usize,
    /// Ids of changed features, in selection order.
    pub changed: Vec<FeatureId>,
}

/// Result of a run: the summary plus every cleaned feature in selection order.
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub summary: ChangeSummary,
    pub cleaned: Vec<Feature>,
    /// Positions into `cleaned`, parallel to `summary.changed`.
    changed_positions: Vec<usize>,
}

impl CleanOutcome {
    /// Cleaned features whose geometry differs from the original, in
    /// selection order.
    pub fn changed_features(&self) -> impl Iterator<Item = &Feature> {
        self.changed_positions.iter().map(|&i| &self.cleaned[i])
    }
}

/// Positions where `cleaned[i]` is not exactly equal to `original[i]`.
pub fn changed_indices(original: &[Geometry], cleaned: &[Geometry]) -> Vec<usize> {
    original
        .iter()
        .zip(cleaned)
        .enumerate()
        .filter(|(_, (before, after))| before != after)
        .map(|(i, _)| i)
        .collect()
}

/// Runs coverage cleaning over a feature selection with a given engine.
#[derive(Debug, Clone)]
pub struct CoverageCleaner<E> {
    engine: E,
    verbose: bool,
}

impl<E: CoverageEngine> CoverageCleaner<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Clean the selected features of `source` and stage changed geometries
    /// back into it.
    ///
    /// Validation happens before any engine call. Any error aborts the run
    /// before the first update is written, and the updates themselves are
    /// handed over as one batch that the source stages entirely or not at all.
    pub async fn run<S: FeatureSource>(
        &self,
        source: Option<&mut S>,
        params: &CleaningParameters,
    ) -> Result<CleanOutcome, CleanError> {
        let source = source.ok_or(ValidationError::NoSelection)?;

        let kind = source.geometry_kind();
        if !kind.is_polygonal() {
            return Err(ValidationError::WrongGeometryType(kind).into());
        }

        let features = source.selected_features();
        info!(selected = features.len(), "Coverage cleaning started");
        if features.len() < MIN_FEATURES {
            return Err(ValidationError::InsufficientFeatures {
                selected: features.len(),
                required: MIN_FEATURES,
            }
            .into());
        }

        info!(
            gap_tolerance = params.gap_tolerance,
            snapping_distance = params.snapping.as_f64(),
            merge_strategy = %params.merge_strategy,
            "Using settings"
        );

        let originals: Arc<[Geometry]> = features.iter().map(|f| f.geometry.clone()).collect();
        let cleaned = channel::clean(&self.engine, Arc::clone(&originals), params).await?;

        // A geometry that vanished would be written back as a deletion.
        if let Some(index) = originals
            .iter()
            .zip(&cleaned)
            .position(|(before, after)| after.is_degenerate() && !before.is_degenerate())
        {
            warn!(index, id = %features[index].id, "Engine returned an empty geometry");
            return Err(TransferError::DegenerateResult { index }.into());
        }

        let changed = changed_indices(&originals, &cleaned);
        for (i, feature) in features.iter().enumerate() {
            if changed.binary_search(&i).is_ok() {
                feature_log!(self.verbose, index = i, id = %feature.id, "Geometry changed");
            } else {
                feature_log!(self.verbose, index = i, id = %feature.id, "Geometry unchanged");
            }
        }

        if !changed.is_empty() {
            let updates = changed
                .iter()
                .map(|&i| (features[i].id, cleaned[i].clone()))
                .collect();
            source
                .update_geometries(updates)
                .map_err(|(id, e)| CleanError::UpdateFailed {
                    id,
                    reason: e.to_string(),
                })?;
        }

        let summary = ChangeSummary {
            total: features.len(),
            changed_count: changed.len(),
            changed: changed.iter().map(|&i| features[i].id).collect(),
        };

        if summary.changed_count > 0 {
            info!(
                changed = summary.changed_count,
                total = summary.total,
                "Coverage cleaned"
            );
        } else {
            info!(total = summary.total, "Coverage already clean");
        }

        let cleaned = features
            .into_iter()
            .zip(cleaned)
            .map(|(feature, geometry)| Feature {
                id: feature.id,
                geometry,
            })
            .collect();

        Ok(CleanOutcome {
            summary,
            cleaned,
            changed_positions: changed,
        })
    }
}
