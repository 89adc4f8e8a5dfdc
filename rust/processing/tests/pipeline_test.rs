// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use approx::assert_relative_eq;
use covclean_core::geo_types::{polygon, Coord, LineString, Polygon};
use covclean_core::{decode, encode, Geometry, GeometryKind};
use covclean_processing::{
    clean, CleanError, CleanedRow, CleaningParameters, CoverageCleaner, CoverageEngine, Feature,
    FeatureId, FeatureSource, MemoryLayer, SnappingDistance, StagedRow, TransferError,
    ValidationError,
};

const SRID_FLAG: u32 = 0x2000_0000;

/// Wrap plain little-endian WKB as EWKB carrying `srid`, the way PostGIS
/// answers `ST_AsEWKB`.
fn to_ewkb(wkb: &[u8], srid: u32) -> Vec<u8> {
    let word = u32::from_le_bytes([wkb[1], wkb[2], wkb[3], wkb[4]]) | SRID_FLAG;
    let mut out = vec![wkb[0]];
    out.extend_from_slice(&word.to_le_bytes());
    out.extend_from_slice(&srid.to_le_bytes());
    out.extend_from_slice(&wkb[5..]);
    out
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]
}

fn layer_of(polygons: Vec<Polygon<f64>>) -> MemoryLayer {
    let features = polygons
        .into_iter()
        .enumerate()
        .map(|(i, p)| Feature::new(100 + i as i64, p))
        .collect();
    MemoryLayer::new("parcels", GeometryKind::Polygon, features)
}

/// Answers in reverse order with SRID-tagged EWKB, optionally swapping in
/// replacement geometries for some indices.
#[derive(Default)]
struct EchoEngine {
    replacements: HashMap<u32, Geometry>,
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

impl EchoEngine {
    fn replacing(replacements: impl IntoIterator<Item = (u32, Geometry)>) -> Self {
        Self {
            replacements: replacements.into_iter().collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CoverageEngine for EchoEngine {
    async fn clean_rows(
        &self,
        rows: Vec<StagedRow>,
        _params: &CleaningParameters,
    ) -> Result<Vec<CleanedRow>, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(rows.len());
        Ok(rows
            .into_iter()
            .rev()
            .map(|row| {
                let wkb = match self.replacements.get(&row.index) {
                    Some(geometry) => encode(geometry).unwrap(),
                    None => row.wkb,
                };
                CleanedRow {
                    index: i64::from(row.index),
                    ewkb: Some(to_ewkb(&wkb, 3844)),
                }
            })
            .collect())
    }
}

/// Toy whole-coverage operator: clusters distinct x and y ordinates that lie
/// within `gap_tolerance` of each other across all polygons and moves each
/// cluster to its mean. Enough to close narrow gaps between rectangles.
struct SnapEngine;

fn map_ring(ring: &LineString<f64>, f: &impl Fn(Coord<f64>) -> Coord<f64>) -> LineString<f64> {
    LineString::new(ring.0.iter().map(|c| f(*c)).collect())
}

fn cluster_means(mut values: Vec<f64>, tolerance: f64) -> Vec<(f64, f64)> {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    values.dedup();
    let mut mapping = Vec::new();
    let mut group: Vec<f64> = Vec::new();
    for v in values {
        if let Some(&last) = group.last() {
            if v - last > tolerance {
                let mean = group.iter().sum::<f64>() / group.len() as f64;
                mapping.extend(group.drain(..).map(|g| (g, mean)));
            }
        }
        group.push(v);
    }
    let mean = group.iter().sum::<f64>() / group.len() as f64;
    mapping.extend(group.drain(..).map(|g| (g, mean)));
    mapping
}

fn lookup(mapping: &[(f64, f64)], v: f64) -> f64 {
    mapping.iter().find(|(k, _)| *k == v).map(|(_, m)| *m).unwrap_or(v)
}

impl CoverageEngine for SnapEngine {
    async fn clean_rows(
        &self,
        rows: Vec<StagedRow>,
        params: &CleaningParameters,
    ) -> Result<Vec<CleanedRow>, TransferError> {
        let polygons: Vec<(u32, Polygon<f64>)> = rows
            .iter()
            .map(|row| match decode(Some(row.wkb.as_slice())).unwrap() {
                Geometry::Polygon(p) => (row.index, p),
                other => panic!("unexpected {other:?}"),
            })
            .collect();

        let coords: Vec<Coord<f64>> = polygons
            .iter()
            .flat_map(|(_, p)| p.exterior().0.clone())
            .collect();
        let xs = cluster_means(coords.iter().map(|c| c.x).collect(), params.gap_tolerance);
        let ys = cluster_means(coords.iter().map(|c| c.y).collect(), params.gap_tolerance);
        let snap = |c: Coord<f64>| Coord {
            x: lookup(&xs, c.x),
            y: lookup(&ys, c.y),
        };

        Ok(polygons
            .into_iter()
            .map(|(index, p)| {
                let snapped = Polygon::new(
                    map_ring(p.exterior(), &snap),
                    p.interiors().iter().map(|r| map_ring(r, &snap)).collect(),
                );
                CleanedRow {
                    index: i64::from(index),
                    ewkb: Some(to_ewkb(&encode(&snapped.into()).unwrap(), 3844)),
                }
            })
            .collect())
    }
}

/// Loses the last row.
struct TruncatingEngine;

impl CoverageEngine for TruncatingEngine {
    async fn clean_rows(
        &self,
        mut rows: Vec<StagedRow>,
        _params: &CleaningParameters,
    ) -> Result<Vec<CleanedRow>, TransferError> {
        rows.pop();
        Ok(rows
            .into_iter()
            .map(|row| CleanedRow {
                index: i64::from(row.index),
                ewkb: Some(row.wkb),
            })
            .collect())
    }
}

/// Returns one fixed answer for every row.
struct FixedEngine(Option<Vec<u8>>);

impl CoverageEngine for FixedEngine {
    async fn clean_rows(
        &self,
        rows: Vec<StagedRow>,
        _params: &CleaningParameters,
    ) -> Result<Vec<CleanedRow>, TransferError> {
        Ok(rows
            .into_iter()
            .map(|row| CleanedRow {
                index: i64::from(row.index),
                ewkb: if row.index == 0 { self.0.clone() } else { Some(row.wkb) },
            })
            .collect())
    }
}

struct UnreachableEngine;

impl CoverageEngine for UnreachableEngine {
    async fn clean_rows(
        &self,
        _rows: Vec<StagedRow>,
        _params: &CleaningParameters,
    ) -> Result<Vec<CleanedRow>, TransferError> {
        Err(TransferError::ConnectionFailed(
            "could not connect to server: Connection refused".into(),
        ))
    }
}

/// Host whose storage refuses the `fail_at`-th geometry of a write. Writes
/// are checked in full before anything reaches the edit buffer.
struct QuotaLayer {
    inner: MemoryLayer,
    fail_at: usize,
    batches: Vec<usize>,
}

impl FeatureSource for QuotaLayer {
    type Error = String;

    fn geometry_kind(&self) -> GeometryKind {
        self.inner.geometry_kind()
    }

    fn selected_features(&self) -> Vec<Feature> {
        self.inner.selected_features()
    }

    fn update_geometries(
        &mut self,
        updates: Vec<(FeatureId, Geometry)>,
    ) -> Result<(), (FeatureId, String)> {
        self.batches.push(updates.len());
        if let Some((id, _)) = updates.get(self.fail_at) {
            return Err((*id, "disk quota exceeded".into()));
        }
        self.inner
            .update_geometries(updates)
            .map_err(|(id, e)| (id, e.to_string()))
    }
}

#[tokio::test]
async fn gap_between_first_two_features_is_closed() {
    let mut layer = layer_of(vec![
        rect(0.0, 0.0, 1.0, 1.0),
        rect(1.005, 0.0, 2.0, 1.0),
        rect(2.0, 0.0, 3.0, 1.0),
    ]);
    let params = CleaningParameters {
        gap_tolerance: 0.01,
        snapping: SnappingDistance::Auto,
        ..Default::default()
    };

    let outcome = CoverageCleaner::new(SnapEngine)
        .run(Some(&mut layer), &params)
        .await
        .unwrap();

    assert_eq!(outcome.summary.total, 3);
    assert_eq!(outcome.summary.changed_count, 2);
    assert_eq!(outcome.summary.changed, vec![FeatureId(100), FeatureId(101)]);

    let edits = layer.pending_edits();
    assert_eq!(edits.len(), 2);
    let shared_edge = |g: &Geometry, corner: usize| match g {
        Geometry::Polygon(p) => p.exterior().0[corner].x,
        other => panic!("expected polygon, got {other:?}"),
    };
    // right edge of feature 0 and left edge of feature 1 meet in the middle
    assert_relative_eq!(shared_edge(edits[0].1, 1), 1.0025, epsilon = 1e-12);
    assert_relative_eq!(shared_edge(edits[1].1, 0), 1.0025, epsilon = 1e-12);
    assert_eq!(
        layer.current_geometry(FeatureId(102)),
        Some(&Geometry::Polygon(rect(2.0, 0.0, 3.0, 1.0)))
    );
}

#[tokio::test]
async fn clean_coverage_is_left_untouched() {
    let mut layer = layer_of(vec![
        rect(0.0, 0.0, 1.0, 1.0),
        rect(1.0, 0.0, 2.0, 1.0),
        rect(0.0, 1.0, 2.0, 2.0),
    ]);
    let originals: Vec<Geometry> = layer
        .selected_features()
        .into_iter()
        .map(|f| f.geometry)
        .collect();

    let outcome = CoverageCleaner::new(SnapEngine)
        .verbose(true)
        .run(Some(&mut layer), &CleaningParameters::default())
        .await
        .unwrap();

    assert_eq!(outcome.summary.changed_count, 0);
    assert!(outcome.summary.changed.is_empty());
    assert!(!layer.is_dirty());
    for (feature, original) in outcome.cleaned.iter().zip(&originals) {
        assert_eq!(&feature.geometry, original);
    }
}

#[tokio::test]
async fn results_follow_input_order_not_engine_order() {
    let batch: Vec<Geometry> = (0..6)
        .map(|i| rect(i as f64, 0.0, i as f64 + 1.0, 1.0).into())
        .collect();
    let marked: Geometry = rect(3.0, 0.0, 4.5, 1.0).into();
    let engine = EchoEngine::replacing([(3, marked.clone())]);

    let cleaned = clean(&engine, batch.clone().into(), &CleaningParameters::default())
        .await
        .unwrap();

    assert_eq!(cleaned.len(), batch.len());
    for (i, geometry) in cleaned.iter().enumerate() {
        if i == 3 {
            assert_eq!(geometry, &marked);
        } else {
            assert_eq!(geometry, &batch[i]);
        }
    }
    // one aggregate call carrying the whole batch
    assert_eq!(engine.calls(), 1);
    assert_eq!(*engine.batch_sizes.lock().unwrap(), vec![6]);
}

#[tokio::test]
async fn short_result_is_a_count_mismatch() {
    let mut layer = layer_of(vec![
        rect(0.0, 0.0, 1.0, 1.0),
        rect(1.0, 0.0, 2.0, 1.0),
        rect(2.0, 0.0, 3.0, 1.0),
    ]);

    let err = CoverageCleaner::new(TruncatingEngine)
        .run(Some(&mut layer), &CleaningParameters::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CleanError::Transfer(TransferError::ResultCountMismatch {
            expected: 3,
            returned: 2
        })
    );
    assert!(!layer.is_dirty());
}

#[tokio::test]
async fn selection_gates_run_before_the_engine() {
    let engine = EchoEngine::default();
    let cleaner = CoverageCleaner::new(engine);
    let params = CleaningParameters::default();

    let err = cleaner
        .run(None::<&mut MemoryLayer>, &params)
        .await
        .unwrap_err();
    assert_eq!(err, CleanError::Validation(ValidationError::NoSelection));

    let mut lines = MemoryLayer::new("roads", GeometryKind::Line, vec![]);
    let err = cleaner.run(Some(&mut lines), &params).await.unwrap_err();
    assert_eq!(
        err,
        CleanError::Validation(ValidationError::WrongGeometryType(GeometryKind::Line))
    );

    for n in 0..2 {
        let mut layer = layer_of((0..n).map(|i| rect(i as f64, 0.0, i as f64 + 1.0, 1.0)).collect());
        let err = cleaner.run(Some(&mut layer), &params).await.unwrap_err();
        assert_eq!(
            err,
            CleanError::Validation(ValidationError::InsufficientFeatures {
                selected: n,
                required: 2
            })
        );
    }

    let bad_params = CleaningParameters {
        gap_tolerance: -1.0,
        ..Default::default()
    };
    let mut layer = layer_of(vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 2.0, 1.0)]);
    let err = cleaner.run(Some(&mut layer), &bad_params).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_PARAMETERS");

    assert_eq!(cleaner.engine().calls(), 0);
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let engine = EchoEngine::default();
    let err = clean(&engine, Vec::<Geometry>::new().into(), &CleaningParameters::default())
        .await
        .unwrap_err();
    assert_eq!(err, CleanError::Validation(ValidationError::EmptyBatch));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn null_input_geometry_aborts_before_submission() {
    let engine = EchoEngine::default();
    let batch = vec![rect(0.0, 0.0, 1.0, 1.0).into(), Geometry::Empty];
    let err = clean(&engine, batch.clone().into(), &CleaningParameters::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_GEOMETRY");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn vanished_geometry_aborts_the_run() {
    let mut layer = layer_of(vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 2.0, 1.0)]);
    let err = CoverageCleaner::new(FixedEngine(None))
        .run(Some(&mut layer), &CleaningParameters::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CleanError::Transfer(TransferError::DegenerateResult { index: 0 })
    );
    assert!(!layer.is_dirty());
}

#[tokio::test]
async fn undecodable_engine_output_aborts_the_run() {
    let mut layer = layer_of(vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 2.0, 1.0)]);
    let err = CoverageCleaner::new(FixedEngine(Some(vec![1, 3, 0, 0, 0, 1, 0, 0, 0, 9])))
        .run(Some(&mut layer), &CleaningParameters::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_GEOMETRY");
    assert!(!layer.is_dirty());
}

#[tokio::test]
async fn transport_failure_is_surfaced_with_cause() {
    let mut layer = layer_of(vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 2.0, 1.0)]);
    let err = CoverageCleaner::new(UnreachableEngine)
        .run(Some(&mut layer), &CleaningParameters::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CONNECTION_FAILED");
    assert!(err.to_string().contains("Connection refused"));
    assert!(!layer.is_dirty());
}

#[tokio::test]
async fn rejected_update_is_reported() {
    let layer = layer_of(vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.005, 0.0, 2.0, 1.0)]);
    let mut locked = layer.read_only(true);
    let err = CoverageCleaner::new(SnapEngine)
        .run(Some(&mut locked), &CleaningParameters::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CleanError::UpdateFailed {
            id: FeatureId(100),
            reason: "Layer is read-only".into()
        }
    );
}

#[tokio::test]
async fn failed_second_update_leaves_nothing_staged() {
    let mut layer = QuotaLayer {
        inner: layer_of(vec![
            rect(0.0, 0.0, 1.0, 1.0),
            rect(1.005, 0.0, 2.0, 1.0),
            rect(2.0, 0.0, 3.0, 1.0),
        ]),
        fail_at: 1,
        batches: Vec::new(),
    };

    let err = CoverageCleaner::new(SnapEngine)
        .run(Some(&mut layer), &CleaningParameters::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CleanError::UpdateFailed {
            id: FeatureId(101),
            reason: "disk quota exceeded".into()
        }
    );
    assert_eq!(layer.batches, vec![2]);
    assert!(!layer.inner.is_dirty());
    assert!(layer.inner.pending_edits().is_empty());
}
