// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Batch transfer channel
//!
//! Encodes an ordered batch, hands it to a [`CoverageEngine`] in one call,
//! and rebuilds the result in input order from the positional index. The
//! call is all-or-nothing: either every cleaned geometry comes back, or an
//! error does.
//!
//! Encoding and decoding are CPU-bound and run on the blocking pool, so a
//! large batch never stalls the async workers.

use std::sync::Arc;

use covclean_core::{decode, encode, CodecError, Geometry};
use rayon::prelude::*;
use tracing::debug;

use crate::engine::{CleanedRow, CoverageEngine, StagedRow};
use crate::error::{CleanError, TransferError, ValidationError};
use crate::params::CleaningParameters;

/// Largest batch whose indices fit a Postgres `INTEGER` column.
pub const MAX_BATCH: usize = i32::MAX as usize;

/// Clean `batch` and return exactly `batch.len()` geometries, where
/// `result[i]` is the cleaned counterpart of `batch[i]`.
pub async fn clean<E: CoverageEngine>(
    engine: &E,
    batch: Arc<[Geometry]>,
    params: &CleaningParameters,
) -> Result<Vec<Geometry>, CleanError> {
    if batch.is_empty() {
        return Err(ValidationError::EmptyBatch.into());
    }
    if batch.len() > MAX_BATCH {
        return Err(ValidationError::BatchTooLarge {
            size: batch.len(),
            max: MAX_BATCH,
        }
        .into());
    }
    params.validate()?;

    let expected = batch.len();
    let rows = tokio::task::spawn_blocking(move || stage(&batch))
        .await
        .map_err(CleanError::task)??;
    debug!(
        features = expected,
        bytes = rows.iter().map(|r| r.wkb.len()).sum::<usize>(),
        "Staged batch"
    );

    let returned = engine.clean_rows(rows, params).await?;
    debug!(rows = returned.len(), "Engine returned");

    if returned.len() != expected {
        return Err(TransferError::ResultCountMismatch {
            expected,
            returned: returned.len(),
        }
        .into());
    }

    let ordered = restore_order(returned, expected)?;
    let cleaned = tokio::task::spawn_blocking(move || unstage(ordered))
        .await
        .map_err(CleanError::task)??;

    Ok(cleaned)
}

/// Encode every geometry; the first failure aborts before anything is sent.
fn stage(batch: &[Geometry]) -> Result<Vec<StagedRow>, CodecError> {
    batch
        .par_iter()
        .enumerate()
        .map(|(i, geometry)| {
            Ok::<_, CodecError>(StagedRow {
                index: i as u32,
                wkb: encode(geometry)?,
            })
        })
        .collect()
}

fn unstage(ordered: Vec<Option<Vec<u8>>>) -> Result<Vec<Geometry>, CodecError> {
    ordered
        .into_par_iter()
        .map(|ewkb| decode(ewkb.as_deref()))
        .collect()
}

/// Slot rows by index. With the count already checked, rejecting
/// out-of-range and duplicate indices guarantees every slot is filled.
fn restore_order(
    rows: Vec<CleanedRow>,
    expected: usize,
) -> Result<Vec<Option<Vec<u8>>>, TransferError> {
    let mut slots: Vec<Option<Option<Vec<u8>>>> = vec![None; expected];

    for row in rows {
        let unexpected = TransferError::UnexpectedIndex {
            index: row.index,
            expected,
        };
        let slot = usize::try_from(row.index)
            .ok()
            .and_then(|i| slots.get_mut(i))
            .ok_or_else(|| unexpected.clone())?;
        if slot.is_some() {
            return Err(unexpected);
        }
        *slot = Some(row.ewkb);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or(TransferError::UnexpectedIndex {
                index: i as i64,
                expected,
            })
        })
        .collect()
}
