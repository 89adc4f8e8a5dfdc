// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use axum::{extract::State, Json};

use crate::types::SettingsResponse;
use crate::AppState;

/// GET /api/v1/settings - Defaults applied to requests without overrides.
pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    let settings = &state.settings;
    Json(SettingsResponse {
        parameters: settings.parameters,
        merge_strategies: SettingsResponse::strategies(),
        verbose_logging: settings.verbose_logging,
        statement_timeout_secs: settings.statement_timeout_secs,
        max_features: state.config.max_features,
    })
}
