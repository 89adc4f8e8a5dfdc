// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Health check and API info endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub database: DatabaseStatus,
}

/// Reachability of the PostGIS instance doing the cleaning.
#[derive(Debug, Serialize)]
pub struct DatabaseStatus {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgis_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// API information response.
#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

/// Endpoint information.
#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

/// GET /api/v1/health - Health check endpoint.
///
/// Always answers 200; a database that cannot be reached reports `degraded`.
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = state.cleaner.engine();
    let database = match engine.ping().await {
        Ok(()) => DatabaseStatus {
            reachable: true,
            postgis_version: engine.postgis_version().await.ok(),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            DatabaseStatus {
                reachable: false,
                postgis_version: None,
                error: Some(e.to_string()),
            }
        }
    };

    Json(HealthResponse {
        status: if database.reachable && database.postgis_version.is_some() {
            "healthy"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        service: "covclean-server",
        database,
    })
}

/// GET / - API information endpoint.
pub async fn info() -> Json<ApiInfoResponse> {
    Json(ApiInfoResponse {
        service: "covclean-server",
        version: env!("CARGO_PKG_VERSION"),
        description: "Polygon coverage cleaning backed by PostGIS ST_CoverageClean",
        endpoints: vec![
            EndpointInfo {
                method: "GET",
                path: "/api/v1/health",
                description: "Health check, including database reachability",
            },
            EndpointInfo {
                method: "GET",
                path: "/api/v1/settings",
                description: "Default cleaning parameters",
            },
            EndpointInfo {
                method: "POST",
                path: "/api/v1/clean",
                description: "Clean a polygon selection and return changed features",
            },
        ],
    })
}
