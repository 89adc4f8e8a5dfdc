// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coverage cleaning server.
//!
//! Accepts a selection of polygon features as hex EWKB, cleans them as one
//! coverage with PostGIS `ST_CoverageClean`, and answers with the features
//! whose geometry changed.
//!
//! # Endpoints
//!
//! - `GET /api/v1/health` - Health check, including database reachability
//! - `GET /api/v1/settings` - Default cleaning parameters
//! - `POST /api/v1/clean` - Clean a selection, return the change set

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use covclean_processing::{CoverageCleaner, PostgisEngine, Settings};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    decompression::RequestDecompressionLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

mod config;
mod error;
mod routes;
mod types;

use config::Config;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub cleaner: Arc<CoverageCleaner<PostgisEngine>>,
    pub settings: Arc<Settings>,
    pub config: Arc<Config>,
}

fn router(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        // Root endpoint - API information
        .route("/", get(routes::health::info))
        // Health check
        .route("/api/v1/health", get(routes::health::check))
        .route("/api/v1/settings", get(routes::settings::get_settings))
        .route("/api/v1/clean", post(routes::clean::clean))
        // Middleware
        .layer(DefaultBodyLimit::max(config.max_body_mb * 1024 * 1024))
        .layer(CompressionLayer::new())
        // Large selections are usually posted gzip-compressed
        .layer(RequestDecompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,covclean_server=debug".into()),
        )
        .pretty()
        .init();

    let config = Config::from_env();
    let settings = Settings::from_env();

    tracing::info!(
        port = config.port,
        max_features = config.max_features,
        gap_tolerance = settings.parameters.gap_tolerance,
        snapping_distance = settings.parameters.snapping.as_f64(),
        merge_strategy = %settings.parameters.merge_strategy,
        verbose_logging = settings.verbose_logging,
        "Starting coverage cleaning server"
    );

    let engine = PostgisEngine::connect_lazy(&settings).context("Invalid service endpoint")?;
    let cleaner = CoverageCleaner::new(engine).verbose(settings.verbose_logging);

    let state = AppState {
        cleaner: Arc::new(cleaner),
        settings: Arc::new(settings),
        config: Arc::new(config.clone()),
    };

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
