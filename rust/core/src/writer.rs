// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WKB writer. Always little-endian (NDR), never carries an SRID.

use geo_types::{LineString, Polygon};

use crate::error::{CodecError, Result};
use crate::geometry::Geometry;

const NDR: u8 = 1;
const TYPE_POLYGON: u32 = 3;
const TYPE_MULTIPOLYGON: u32 = 6;

/// Serialized size, so the output buffer is allocated once.
fn polygon_size(polygon: &Polygon<f64>) -> usize {
    let rings = ring_count(polygon);
    let coords = polygon.exterior().0.len()
        + polygon.interiors().iter().map(|r| r.0.len()).sum::<usize>();
    9 + rings * 4 + coords * 16
}

/// A polygon with an empty shell and no holes is POLYGON EMPTY: zero rings.
fn ring_count(polygon: &Polygon<f64>) -> usize {
    if polygon.exterior().0.is_empty() && polygon.interiors().is_empty() {
        0
    } else {
        1 + polygon.interiors().len()
    }
}

fn write_count(out: &mut Vec<u8>, n: usize) -> Result<()> {
    let n = u32::try_from(n).map_err(|_| {
        CodecError::InvalidGeometry(format!("{n} elements exceed the WKB count limit"))
    })?;
    out.extend_from_slice(&n.to_le_bytes());
    Ok(())
}

fn write_header(out: &mut Vec<u8>, type_code: u32) {
    out.push(NDR);
    out.extend_from_slice(&type_code.to_le_bytes());
}

fn write_ring(out: &mut Vec<u8>, ring: &LineString<f64>) -> Result<()> {
    write_count(out, ring.0.len())?;
    for c in &ring.0 {
        out.extend_from_slice(&c.x.to_le_bytes());
        out.extend_from_slice(&c.y.to_le_bytes());
    }
    Ok(())
}

fn write_polygon(out: &mut Vec<u8>, polygon: &Polygon<f64>) -> Result<()> {
    write_header(out, TYPE_POLYGON);
    let rings = ring_count(polygon);
    write_count(out, rings)?;
    if rings == 0 {
        return Ok(());
    }
    write_ring(out, polygon.exterior())?;
    for interior in polygon.interiors() {
        write_ring(out, interior)?;
    }
    Ok(())
}

pub(crate) fn write_wkb(geometry: &Geometry) -> Result<Vec<u8>> {
    match geometry {
        Geometry::Empty => Err(CodecError::InvalidGeometry(
            "cannot encode a null geometry".to_string(),
        )),
        Geometry::Polygon(polygon) => {
            let mut out = Vec::with_capacity(polygon_size(polygon));
            write_polygon(&mut out, polygon)?;
            Ok(out)
        }
        Geometry::MultiPolygon(multi) => {
            let size = 9 + multi.0.iter().map(polygon_size).sum::<usize>();
            let mut out = Vec::with_capacity(size);
            write_header(&mut out, TYPE_MULTIPOLYGON);
            write_count(&mut out, multi.0.len())?;
            for polygon in &multi.0 {
                write_polygon(&mut out, polygon)?;
            }
            Ok(out)
        }
    }
}
