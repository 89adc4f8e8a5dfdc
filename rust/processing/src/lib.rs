// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coverage cleaning pipeline shared by the server and embedding hosts.
//!
//! - [`channel::clean`] hands an ordered batch to a [`CoverageEngine`] in one
//!   call and returns the cleaned geometries in input order.
//! - [`CoverageCleaner`] validates a feature selection, cleans it, and stages
//!   only the geometries that changed.
//! - [`PostgisEngine`] runs `ST_CoverageClean` on a PostGIS server.

pub mod channel;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod params;
pub mod postgis;
pub mod settings;
pub mod source;

pub use channel::clean;
pub use engine::{CleanedRow, CoverageEngine, StagedRow};
pub use error::{CleanError, TransferError, ValidationError};
pub use orchestrator::{changed_indices, ChangeSummary, CleanOutcome, CoverageCleaner, MIN_FEATURES};
pub use params::{CleaningParameters, MergeStrategy, ParameterOverrides, SnappingDistance};
pub use postgis::PostgisEngine;
pub use settings::Settings;
pub use source::{Feature, FeatureId, FeatureSource, LayerError, MemoryLayer};
