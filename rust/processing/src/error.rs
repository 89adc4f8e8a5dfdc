// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error taxonomy for a cleaning call.
//!
//! Every error aborts the call it occurs in. Nothing is retried here; a retry
//! policy, if any, belongs to whoever renders the message.

use covclean_core::{CodecError, GeometryKind};
use thiserror::Error;

use crate::source::FeatureId;

/// User-input problems. Reported with no side effects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("No feature collection selected")]
    NoSelection,

    #[error("Collection must contain polygon geometries (found {0:?})")]
    WrongGeometryType(GeometryKind),

    #[error("Please select at least {required} features to clean coverage (got {selected})")]
    InsufficientFeatures { selected: usize, required: usize },

    #[error("Cannot clean an empty batch")]
    EmptyBatch,

    #[error("Batch of {size} geometries exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Invalid cleaning parameters: {0}")]
    InvalidParameters(String),
}

/// External-dependency problems, surfaced with the underlying cause.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Engine returned {returned} rows for {expected} staged geometries")]
    ResultCountMismatch { expected: usize, returned: usize },

    #[error("Engine returned unexpected feature index {index} for a batch of {expected}")]
    UnexpectedIndex { index: i64, expected: usize },

    #[error("Coverage cleaning call failed: {0}")]
    EngineInvocationFailed(String),

    #[error("Engine returned an empty geometry for feature {index}")]
    DegenerateResult { index: usize },
}

impl TransferError {
    pub(crate) fn connection(err: impl std::fmt::Display) -> Self {
        TransferError::ConnectionFailed(err.to_string())
    }

    pub(crate) fn invocation(err: impl std::fmt::Display) -> Self {
        TransferError::EngineInvocationFailed(err.to_string())
    }
}

/// Anything that can abort a cleaning run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CleanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("Failed to update feature {id}: {reason}")]
    UpdateFailed { id: FeatureId, reason: String },

    #[error("Codec task failed: {0}")]
    Task(String),
}

impl CleanError {
    /// Stable machine-readable code for the error category and variant.
    pub fn code(&self) -> &'static str {
        match self {
            CleanError::Validation(e) => match e {
                ValidationError::NoSelection => "NO_SELECTION",
                ValidationError::WrongGeometryType(_) => "WRONG_GEOMETRY_TYPE",
                ValidationError::InsufficientFeatures { .. } => "INSUFFICIENT_FEATURES",
                ValidationError::EmptyBatch => "EMPTY_BATCH",
                ValidationError::BatchTooLarge { .. } => "BATCH_TOO_LARGE",
                ValidationError::InvalidParameters(_) => "INVALID_PARAMETERS",
            },
            CleanError::Codec(e) => match e {
                CodecError::MalformedHeader(_) => "MALFORMED_HEADER",
                CodecError::InvalidGeometry(_) => "INVALID_GEOMETRY",
            },
            CleanError::Transfer(e) => match e {
                TransferError::ConnectionFailed(_) => "CONNECTION_FAILED",
                TransferError::ResultCountMismatch { .. } => "RESULT_COUNT_MISMATCH",
                TransferError::UnexpectedIndex { .. } => "UNEXPECTED_INDEX",
                TransferError::EngineInvocationFailed(_) => "ENGINE_INVOCATION_FAILED",
                TransferError::DegenerateResult { .. } => "DEGENERATE_RESULT",
            },
            CleanError::UpdateFailed { .. } => "UPDATE_FAILED",
            CleanError::Task(_) => "TASK_ERROR",
        }
    }

    pub(crate) fn task(err: tokio::task::JoinError) -> Self {
        CleanError::Task(err.to_string())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CleanError::Validation(_))
    }
}
