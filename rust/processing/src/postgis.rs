// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PostGIS engine. Stages a batch in a transaction-scoped temp table and
//! runs `ST_CoverageClean` over it as one window.
//!
//! Getting a connection is bounded by the pool's acquire timeout and fails as
//! `ConnectionFailed`; the staging and cleaning statements are bounded by the
//! statement timeout and fail as `EngineInvocationFailed`.
//!
//! Everything happens inside a single transaction that is never committed.
//! The staging table is `ON COMMIT DROP` and is also discarded by the
//! rollback, so no path (error, timeout, dropped future) leaves state behind:
//! dropping an open `sqlx::Transaction` rolls it back and returns the
//! connection to the pool.

use std::future::Future;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};

use crate::engine::{CleanedRow, CoverageEngine, StagedRow};
use crate::error::TransferError;
use crate::params::CleaningParameters;
use crate::settings::Settings;

const CREATE_STAGING: &str = r#"
    CREATE TEMP TABLE coverage_input (
        feature_order INTEGER PRIMARY KEY,
        geom geometry
    ) ON COMMIT DROP
"#;

const STAGE_ROWS: &str = r#"
    INSERT INTO coverage_input (feature_order, geom)
    SELECT staged.feature_order, ST_GeomFromWKB(staged.wkb)
    FROM UNNEST($1::INT[], $2::BYTEA[]) AS staged(feature_order, wkb)
"#;

const CLEAN_WINDOW: &str = r#"
    SELECT
        feature_order,
        ST_AsEWKB(
            ST_CoverageClean(geom, $1::float8, $2::float8, $3::text) OVER ()
        ) AS geom
    FROM coverage_input
    ORDER BY feature_order
"#;

/// `ST_CoverageClean` on a Postgres/PostGIS server.
#[derive(Debug, Clone)]
pub struct PostgisEngine {
    pool: PgPool,
    statement_timeout: Duration,
    verbose: bool,
}

impl PostgisEngine {
    /// Build an engine whose pool connects on first use.
    pub fn connect_lazy(settings: &Settings) -> Result<Self, TransferError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .acquire_timeout(settings.connect_timeout())
            .connect_lazy(&settings.service_endpoint)
            .map_err(TransferError::connection)?;

        Ok(Self {
            pool,
            statement_timeout: settings.statement_timeout(),
            verbose: settings.verbose_logging,
        })
    }

    pub fn with_pool(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Round trip to the server.
    pub async fn ping(&self) -> Result<(), TransferError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(TransferError::connection)?;
        Ok(())
    }

    /// PostGIS library version, e.g. `3.6.0`.
    pub async fn postgis_version(&self) -> Result<String, TransferError> {
        let (version,): (String,) = sqlx::query_as("SELECT postgis_lib_version()")
            .fetch_one(&self.pool)
            .await
            .map_err(TransferError::invocation)?;
        Ok(version)
    }

    /// Stage the batch and run the window inside `tx`.
    async fn run_window(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        orders: Vec<i32>,
        blobs: Vec<Vec<u8>>,
        params: &CleaningParameters,
    ) -> Result<Vec<(i32, Option<Vec<u8>>)>, TransferError> {
        let staged = orders.len();

        sqlx::query(CREATE_STAGING)
            .execute(&mut **tx)
            .await
            .map_err(TransferError::invocation)?;

        // One statement, so a partially staged batch is never visible.
        let inserted = sqlx::query(STAGE_ROWS)
            .bind(orders)
            .bind(blobs)
            .execute(&mut **tx)
            .await
            .map_err(TransferError::invocation)?
            .rows_affected();
        if inserted != staged as u64 {
            return Err(TransferError::EngineInvocationFailed(format!(
                "staged {inserted} of {staged} geometries"
            )));
        }

        if self.verbose {
            info!(
                features = staged,
                gap_tolerance = params.gap_tolerance,
                snapping_distance = params.snapping.as_f64(),
                merge_strategy = params.merge_strategy.as_engine_literal(),
                "Executing ST_CoverageClean"
            );
        } else {
            debug!(features = staged, "Executing ST_CoverageClean");
        }

        sqlx::query_as(CLEAN_WINDOW)
            .bind(params.gap_tolerance)
            .bind(params.snapping.as_f64())
            .bind(params.merge_strategy.as_engine_literal())
            .fetch_all(&mut **tx)
            .await
            .map_err(TransferError::invocation)
    }
}

/// Run `work`, giving up after `limit`. An overrun is an engine failure.
async fn bounded<T>(
    limit: Duration,
    work: impl Future<Output = Result<T, TransferError>>,
) -> Result<T, TransferError> {
    tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
        Err(TransferError::EngineInvocationFailed(format!(
            "no result within {limit:?}"
        )))
    })
}

impl CoverageEngine for PostgisEngine {
    async fn clean_rows(
        &self,
        rows: Vec<StagedRow>,
        params: &CleaningParameters,
    ) -> Result<Vec<CleanedRow>, TransferError> {
        let staged = rows.len();
        let mut orders = Vec::with_capacity(staged);
        let mut blobs = Vec::with_capacity(staged);
        for row in rows {
            let order = i32::try_from(row.index).map_err(|_| TransferError::UnexpectedIndex {
                index: i64::from(row.index),
                expected: staged,
            })?;
            orders.push(order);
            blobs.push(row.wkb);
        }

        // Bounded by the pool's acquire timeout; only the statements below
        // count against the statement timeout.
        let mut tx = self.pool.begin().await.map_err(TransferError::connection)?;
        debug!("Opened transaction");

        let results = bounded(
            self.statement_timeout,
            self.run_window(&mut tx, orders, blobs, params),
        )
        .await?;

        // Results are already in hand; a failed rollback only costs the
        // connection, which sqlx discards.
        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "Rollback of staging transaction failed");
        }

        Ok(results
            .into_iter()
            .map(|(order, ewkb)| CleanedRow {
                index: i64::from(order),
                ewkb,
            })
            .collect())
    }
}
