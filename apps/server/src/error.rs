// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types and handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use covclean_processing::{CleanError, TransferError, ValidationError};
use serde::Serialize;
use thiserror::Error;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Too many features: maximum is {max}, got {got}")]
    TooManyFeatures { max: usize, got: usize },

    #[error("Feature {id}: {reason}")]
    InvalidFeature { id: i64, reason: String },

    #[error("Feature {0} appears more than once")]
    DuplicateFeature(i64),

    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error("Join error")]
    Join(#[from] tokio::task::JoinError),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::TooManyFeatures { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "TOO_MANY_FEATURES"),
            ApiError::InvalidFeature { .. } => (StatusCode::BAD_REQUEST, "INVALID_FEATURE"),
            ApiError::DuplicateFeature(_) => (StatusCode::BAD_REQUEST, "DUPLICATE_FEATURE"),
            ApiError::Join(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TASK_ERROR"),
            ApiError::Clean(err) => {
                let status = match err {
                    CleanError::Validation(v) => match v {
                        ValidationError::WrongGeometryType(_)
                        | ValidationError::InsufficientFeatures { .. } => {
                            StatusCode::UNPROCESSABLE_ENTITY
                        }
                        ValidationError::BatchTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                        _ => StatusCode::BAD_REQUEST,
                    },
                    // Inputs are decoded before the run, so codec failures here
                    // come from engine output.
                    CleanError::Codec(_) => StatusCode::BAD_GATEWAY,
                    CleanError::Transfer(TransferError::ConnectionFailed(_)) => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    CleanError::Transfer(_) => StatusCode::BAD_GATEWAY,
                    CleanError::UpdateFailed { .. } | CleanError::Task(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.code())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        } else {
            tracing::debug!(code, error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Clean(err.into())
    }
}
