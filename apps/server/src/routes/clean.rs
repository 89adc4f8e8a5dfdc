// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coverage cleaning endpoint.

use std::time::Instant;

use axum::{extract::State, Json};
use covclean_core::{decode_hex, encode_hex, peek_kind, GeometryKind};
use covclean_processing::{CleanError, Feature, FeatureId, MemoryLayer};
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::error::ApiError;
use crate::types::{ChangedFeature, CleanRequest, CleanResponse, CleanStats, FeatureInput};
use crate::AppState;

/// Submitted features as a layer the orchestrator can work on.
#[derive(Debug)]
struct Selection {
    kind: GeometryKind,
    features: Vec<Feature>,
}

/// Decode one submitted feature. Non-polygonal geometries are classified but
/// not decoded; the layer is rejected as a whole by kind.
fn decode_feature(input: &FeatureInput) -> Result<(GeometryKind, Option<Feature>), ApiError> {
    let invalid = |reason: String| ApiError::InvalidFeature {
        id: input.id,
        reason,
    };

    let hex = input
        .geometry
        .as_deref()
        .ok_or_else(|| invalid("geometry is null".into()))?;
    let kind = peek_kind(hex.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    if !kind.is_polygonal() {
        return Ok((kind, None));
    }

    let geometry = decode_hex(hex).map_err(|e| invalid(e.to_string()))?;
    Ok((
        kind,
        Some(Feature {
            id: FeatureId(input.id),
            geometry,
        }),
    ))
}

fn decode_selection(inputs: &[FeatureInput]) -> Result<Selection, ApiError> {
    let mut seen = FxHashSet::default();
    if let Some(dup) = inputs.iter().find(|f| !seen.insert(f.id)) {
        return Err(ApiError::DuplicateFeature(dup.id));
    }

    let decoded: Vec<(GeometryKind, Option<Feature>)> =
        inputs.par_iter().map(decode_feature).collect::<Result<_, _>>()?;

    if let Some((kind, _)) = decoded.iter().find(|(kind, _)| !kind.is_polygonal()) {
        return Ok(Selection {
            kind: *kind,
            features: Vec::new(),
        });
    }

    Ok(Selection {
        kind: GeometryKind::Polygon,
        features: decoded.into_iter().filter_map(|(_, f)| f).collect(),
    })
}

/// POST /api/v1/clean - Clean a polygon selection as one coverage.
pub async fn clean(
    State(state): State<AppState>,
    Json(request): Json<CleanRequest>,
) -> Result<Json<CleanResponse>, ApiError> {
    let start = Instant::now();
    let submitted = request.features.len();

    if submitted > state.config.max_features {
        return Err(ApiError::TooManyFeatures {
            max: state.config.max_features,
            got: submitted,
        });
    }

    let params = request.parameters.apply(&state.settings.parameters)?;

    let inputs = request.features;
    let selection = tokio::task::spawn_blocking(move || decode_selection(&inputs)).await??;
    let decode_time_ms = start.elapsed().as_millis() as u64;
    tracing::debug!(
        features = submitted,
        kind = ?selection.kind,
        decode_time_ms,
        "Decoded selection"
    );

    let mut layer = MemoryLayer::new("request", selection.kind, selection.features);
    let outcome = state.cleaner.run(Some(&mut layer), &params).await?;

    let changed = outcome
        .changed_features()
        .map(|f| -> Result<ChangedFeature, ApiError> {
            Ok(ChangedFeature {
                id: f.id.0,
                geometry: encode_hex(&f.geometry).map_err(CleanError::from)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        total = outcome.summary.total,
        changed = outcome.summary.changed_count,
        elapsed_ms,
        "Clean request complete"
    );

    Ok(Json(CleanResponse {
        total: outcome.summary.total,
        changed_count: outcome.summary.changed_count,
        changed,
        stats: CleanStats {
            decode_time_ms,
            elapsed_ms,
        },
    }))
}
