// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request types for the API.

use covclean_processing::ParameterOverrides;
use serde::Deserialize;

/// Body of `POST /api/v1/clean`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CleanRequest {
    /// Selected features, in the order they should be cleaned.
    pub features: Vec<FeatureInput>,

    /// Per-request overrides merged onto the server defaults.
    #[serde(default)]
    pub parameters: ParameterOverrides,
}

/// One selected feature.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureInput {
    pub id: i64,
    /// Hex-encoded WKB or EWKB, either case. `null` is rejected.
    #[serde(default)]
    pub geometry: Option<String>,
}
