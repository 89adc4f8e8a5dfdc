// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # CovClean Core
//!
//! Polygon geometry model and EWKB codec shared by the coverage cleaning
//! pipeline. Parsing is built with [nom](https://docs.rs/nom), the structured
//! form is [geo-types](https://docs.rs/geo-types).
//!
//! ## Overview
//!
//! - **Decoding**: hex or binary EWKB in, [`Geometry`] out. SRIDs are
//!   stripped, both byte orders are accepted, NULL decodes to
//!   [`Geometry::Empty`].
//! - **Encoding**: [`Geometry`] to plain little-endian WKB, ready to be bound
//!   as `bytea` for `ST_GeomFromWKB`.
//! - **Classification**: [`peek_kind`] reads only the header, so a host can
//!   type a layer without parsing every body.
//!
//! ## Quick Start
//!
//! ```rust
//! use covclean_core::geo_types::polygon;
//! use covclean_core::{decode, decode_hex, encode, srid, Geometry, GeometryKind};
//!
//! // Unit square as PostGIS answers `ST_AsEWKB`, SRID 4326
//! let ewkb = "0103000020E6100000010000000500000000000000000000000000000000000000000000000000F03F0000000000000000000000000000F03F000000000000F03F0000000000000000000000000000F03F00000000000000000000000000000000";
//! assert_eq!(srid(ewkb.as_bytes())?, Some(4326));
//!
//! let geometry = decode_hex(ewkb)?;
//! assert_eq!(geometry.kind(), GeometryKind::Polygon);
//! assert_eq!(
//!     geometry,
//!     Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)])
//! );
//!
//! // Plain WKB back out, no SRID
//! let wkb = encode(&geometry)?;
//! assert_eq!(srid(&wkb)?, None);
//! assert_eq!(decode(Some(wkb.as_slice()))?, geometry);
//! # Ok::<(), covclean_core::CodecError>(())
//! ```
//!
//! Round-trips preserve geometric content exactly. The SRID is not preserved.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization support for [`Geometry`] and [`GeometryKind`]

pub mod error;
pub mod ewkb;
pub mod geometry;
mod reader;
mod writer;

pub use error::{CodecError, Result};
pub use ewkb::{decode, decode_hex, encode, encode_hex, peek_kind, srid, strip_srid};
pub use geometry::{Geometry, GeometryKind};

// Re-export geo-types so callers build geometries against the same version
pub use geo_types;
