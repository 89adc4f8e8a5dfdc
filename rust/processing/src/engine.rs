// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Seam between the pipeline and whatever actually cleans the coverage.

use std::future::Future;

use crate::error::TransferError;
use crate::params::CleaningParameters;

/// One staged input: positional index and plain WKB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRow {
    pub index: u32,
    pub wkb: Vec<u8>,
}

/// One engine output row, exactly as the engine reported it. The index is
/// not trusted and is checked by the caller; a NULL geometry is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedRow {
    pub index: i64,
    pub ewkb: Option<Vec<u8>>,
}

/// A coverage cleaning operator evaluated over the whole batch at once.
///
/// Implementations receive every staged row in a single call and must run
/// the operator as one window over all of them; per-row invocation would
/// lose the adjacency information the operator depends on. Output order is
/// unspecified.
pub trait CoverageEngine {
    fn clean_rows(
        &self,
        rows: Vec<StagedRow>,
        params: &CleaningParameters,
    ) -> impl Future<Output = Result<Vec<CleanedRow>, TransferError>> + Send;
}
