// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structured geometry form used for comparison and diffing.
//!
//! Equality is the exact, coordinate-by-coordinate comparison derived by
//! `geo-types`. No tolerance is applied here; callers that need fuzzy
//! matching must do it themselves.

use geo_types::{MultiPolygon, Polygon};

/// A polygonal geometry, or the null sentinel.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Geometry {
    /// No geometry (NULL column, absent input)
    #[default]
    Empty,
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

/// Coarse geometry classification, mirroring how GIS layers are typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
    Collection,
    Unknown,
}

impl GeometryKind {
    /// Classify an OGC base type code (1..=7).
    pub fn from_type_code(code: u32) -> Self {
        match code {
            1 | 4 => GeometryKind::Point,
            2 | 5 => GeometryKind::Line,
            3 | 6 => GeometryKind::Polygon,
            7 => GeometryKind::Collection,
            _ => GeometryKind::Unknown,
        }
    }

    #[inline]
    pub fn is_polygonal(self) -> bool {
        self == GeometryKind::Polygon
    }
}

impl Geometry {
    /// Kind of this geometry. `Empty` reports `Unknown`.
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Empty => GeometryKind::Unknown,
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => GeometryKind::Polygon,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Geometry::Empty)
    }

    /// True when there is no areal content left: the null sentinel, a polygon
    /// with an empty shell, or a multipolygon whose members are all empty.
    pub fn is_degenerate(&self) -> bool {
        match self {
            Geometry::Empty => true,
            Geometry::Polygon(p) => p.exterior().0.is_empty(),
            Geometry::MultiPolygon(mp) => mp.0.iter().all(|p| p.exterior().0.is_empty()),
        }
    }

    /// Total number of coordinates across all rings.
    pub fn coord_count(&self) -> usize {
        fn polygon_coords(p: &Polygon<f64>) -> usize {
            p.exterior().0.len() + p.interiors().iter().map(|r| r.0.len()).sum::<usize>()
        }
        match self {
            Geometry::Empty => 0,
            Geometry::Polygon(p) => polygon_coords(p),
            Geometry::MultiPolygon(mp) => mp.0.iter().map(polygon_coords).sum(),
        }
    }
}

impl From<Polygon<f64>> for Geometry {
    fn from(polygon: Polygon<f64>) -> Self {
        Geometry::Polygon(polygon)
    }
}

impl From<MultiPolygon<f64>> for Geometry {
    fn from(multi: MultiPolygon<f64>) -> Self {
        Geometry::MultiPolygon(multi)
    }
}
