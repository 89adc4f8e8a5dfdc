// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WKB body parser using nom
//!
//! Reads plain (SRID-free) polygonal WKB in either byte order. Every nested
//! geometry carries its own byte order marker, so endianness is threaded
//! through the parsers rather than fixed per blob.

use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use nom::{
    error::{ErrorKind, ParseError},
    multi::count,
    number::complete::{be_u8, f64 as float64, u32 as uint32},
    number::Endianness,
    IResult,
};

use crate::error::{CodecError, Result};
use crate::geometry::{Geometry, GeometryKind};

pub(crate) const FLAG_Z: u32 = 0x8000_0000;
pub(crate) const FLAG_M: u32 = 0x4000_0000;
pub(crate) const FLAG_SRID: u32 = 0x2000_0000;
const TYPE_MASK: u32 = 0x0FFF_FFFF;

const TYPE_POLYGON: u32 = 3;
const TYPE_MULTIPOLYGON: u32 = 6;

/// Smallest encoding of one element, used to bound counts against input.
const COORD_SIZE: usize = 16;
const RING_MIN_SIZE: usize = 4;
const POLYGON_MIN_SIZE: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReadError {
    Truncated,
    ByteOrder(u8),
    Unsupported(String),
    Oversized { count: u32, remaining: usize },
}

impl<I> ParseError<I> for ReadError {
    fn from_error_kind(_input: I, _kind: ErrorKind) -> Self {
        ReadError::Truncated
    }

    fn append(_input: I, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl From<ReadError> for CodecError {
    fn from(err: ReadError) -> Self {
        let message = match err {
            ReadError::Truncated => "unexpected end of input".to_string(),
            ReadError::ByteOrder(b) => format!("invalid nested byte order marker 0x{b:02x}"),
            ReadError::Unsupported(what) => format!("unsupported {what}"),
            ReadError::Oversized { count, remaining } => {
                format!("element count {count} exceeds the {remaining} bytes remaining")
            }
        };
        CodecError::InvalidGeometry(message)
    }
}

type Res<'a, T> = IResult<&'a [u8], T, ReadError>;

fn fail<'a, T>(err: ReadError) -> Res<'a, T> {
    Err(nom::Err::Failure(err))
}

/// Byte order marker and type word of one (possibly nested) geometry
#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
    pub endian: Endianness,
    pub type_word: u32,
}

impl Header {
    /// OGC base type code with EWKB flags and ISO dimension offsets removed
    pub fn base_type(&self) -> u32 {
        (self.type_word & TYPE_MASK) % 1000
    }

    pub fn has_srid(&self) -> bool {
        self.type_word & FLAG_SRID != 0
    }

    fn has_extra_dimensions(&self) -> bool {
        self.type_word & (FLAG_Z | FLAG_M) != 0 || (self.type_word & TYPE_MASK) >= 1000
    }

    pub fn kind(&self) -> GeometryKind {
        GeometryKind::from_type_code(self.base_type())
    }
}

fn byte_order(input: &[u8]) -> Res<'_, Endianness> {
    let (rest, marker) = be_u8::<_, ReadError>(input)?;
    match marker {
        0 => Ok((rest, Endianness::Big)),
        1 => Ok((rest, Endianness::Little)),
        other => fail(ReadError::ByteOrder(other)),
    }
}

pub(crate) fn header(input: &[u8]) -> Res<'_, Header> {
    let (input, endian) = byte_order(input)?;
    let (input, type_word) = uint32::<_, ReadError>(endian)(input)?;
    Ok((input, Header { endian, type_word }))
}

/// Read a u32 element count and reject it if the input cannot possibly hold
/// that many elements of at least `min_size` bytes.
fn bounded_count(endian: Endianness, min_size: usize) -> impl Fn(&[u8]) -> Res<'_, usize> {
    move |input| {
        let (rest, n) = uint32::<_, ReadError>(endian)(input)?;
        if (n as usize).saturating_mul(min_size) > rest.len() {
            return fail(ReadError::Oversized {
                count: n,
                remaining: rest.len(),
            });
        }
        Ok((rest, n as usize))
    }
}

fn coord(endian: Endianness) -> impl Fn(&[u8]) -> Res<'_, Coord<f64>> {
    move |input| {
        let (input, x) = float64::<_, ReadError>(endian)(input)?;
        let (input, y) = float64::<_, ReadError>(endian)(input)?;
        Ok((input, Coord { x, y }))
    }
}

fn ring(endian: Endianness) -> impl Fn(&[u8]) -> Res<'_, LineString<f64>> {
    move |input| {
        let (input, n) = bounded_count(endian, COORD_SIZE)(input)?;
        let (input, coords) = count(coord(endian), n)(input)?;
        Ok((input, LineString::new(coords)))
    }
}

fn polygon_body(endian: Endianness) -> impl Fn(&[u8]) -> Res<'_, Polygon<f64>> {
    move |input| {
        let (input, n) = bounded_count(endian, RING_MIN_SIZE)(input)?;
        let (input, mut rings) = count(ring(endian), n)(input)?;
        // WKB POLYGON EMPTY has zero rings
        let polygon = if rings.is_empty() {
            Polygon::new(LineString::new(Vec::new()), Vec::new())
        } else {
            let exterior = rings.remove(0);
            Polygon::new(exterior, rings)
        };
        Ok((input, polygon))
    }
}

fn check_dimensions(head: &Header) -> std::result::Result<(), ReadError> {
    if head.has_extra_dimensions() {
        return Err(ReadError::Unsupported(format!(
            "Z/M dimensions (type word 0x{:08x})",
            head.type_word
        )));
    }
    Ok(())
}

/// Skip an SRID on nested geometries; PostGIS never writes one, other
/// producers occasionally do.
fn skip_srid<'a>(head: &Header, input: &'a [u8]) -> Res<'a, ()> {
    if head.has_srid() {
        let (input, _) = uint32::<_, ReadError>(head.endian)(input)?;
        return Ok((input, ()));
    }
    Ok((input, ()))
}

fn member_polygon(input: &[u8]) -> Res<'_, Polygon<f64>> {
    let (input, head) = header(input)?;
    if let Err(e) = check_dimensions(&head) {
        return fail(e);
    }
    if head.base_type() != TYPE_POLYGON {
        return fail(ReadError::Unsupported(format!(
            "multipolygon member with type code {}",
            head.base_type()
        )));
    }
    let (input, ()) = skip_srid(&head, input)?;
    polygon_body(head.endian)(input)
}

fn geometry(input: &[u8]) -> Res<'_, Geometry> {
    let (input, head) = header(input)?;
    if let Err(e) = check_dimensions(&head) {
        return fail(e);
    }
    let (input, ()) = skip_srid(&head, input)?;

    match head.base_type() {
        TYPE_POLYGON => {
            let (input, polygon) = polygon_body(head.endian)(input)?;
            Ok((input, Geometry::Polygon(polygon)))
        }
        TYPE_MULTIPOLYGON => {
            let (input, n) = bounded_count(head.endian, POLYGON_MIN_SIZE)(input)?;
            let (input, polygons) = count(member_polygon, n)(input)?;
            Ok((input, Geometry::MultiPolygon(MultiPolygon(polygons))))
        }
        other => fail(ReadError::Unsupported(format!(
            "{:?} geometry (type code {other})",
            GeometryKind::from_type_code(other)
        ))),
    }
}

/// Parse one complete WKB geometry. Trailing bytes are an error.
pub(crate) fn read_wkb(bytes: &[u8]) -> Result<Geometry> {
    let (rest, geometry) = geometry(bytes).map_err(|e| match e {
        nom::Err::Error(err) | nom::Err::Failure(err) => CodecError::from(err),
        nom::Err::Incomplete(_) => CodecError::from(ReadError::Truncated),
    })?;

    if !rest.is_empty() {
        return Err(CodecError::InvalidGeometry(format!(
            "{} trailing bytes after geometry",
            rest.len()
        )));
    }

    Ok(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_polygon(coords: &[(f64, f64)]) -> Vec<u8> {
        let mut out = vec![1u8];
        out.extend_from_slice(&3u32.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&(coords.len() as u32).to_le_bytes());
        for (x, y) in coords {
            out.extend_from_slice(&x.to_le_bytes());
            out.extend_from_slice(&y.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_header() {
        let bytes = le_polygon(&[(0.0, 0.0)]);
        let (_, head) = header(&bytes).unwrap();
        assert_eq!(head.endian, Endianness::Little);
        assert_eq!(head.base_type(), 3);
        assert!(!head.has_srid());
        assert_eq!(head.kind(), GeometryKind::Polygon);
    }

    #[test]
    fn test_read_triangle() {
        let bytes = le_polygon(&[(0.0, 0.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)]);
        let geometry = read_wkb(&bytes).unwrap();
        match geometry {
            Geometry::Polygon(p) => {
                assert_eq!(p.exterior().0.len(), 4);
                assert_eq!(p.exterior().0[1], Coord { x: 2.0, y: 0.0 });
                assert!(p.interiors().is_empty());
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn test_member_srid_is_skipped() {
        let ring = [(0.0, 0.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)];
        let plain = le_polygon(&ring);
        let mut member = vec![1u8];
        member.extend_from_slice(&(3u32 | FLAG_SRID).to_le_bytes());
        member.extend_from_slice(&4326u32.to_le_bytes());
        member.extend_from_slice(&plain[5..]);

        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&6u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&member);

        let expected = match read_wkb(&plain).unwrap() {
            Geometry::Polygon(p) => p,
            other => panic!("expected polygon, got {other:?}"),
        };
        assert_eq!(
            read_wkb(&bytes).unwrap(),
            Geometry::MultiPolygon(MultiPolygon(vec![expected]))
        );
    }

    #[test]
    fn test_truncated_body() {
        let mut bytes = le_polygon(&[(0.0, 0.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)]);
        bytes.truncate(bytes.len() - 3);
        // count check fires before the coordinates are read
        assert!(matches!(read_wkb(&bytes), Err(CodecError::InvalidGeometry(_))));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = le_polygon(&[(0.0, 0.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)]);
        bytes.push(0);
        let err = read_wkb(&bytes).unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidGeometry("1 trailing bytes after geometry".to_string())
        );
    }

    #[test]
    fn test_hostile_count() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        let err = read_wkb(&bytes).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_rejects_point_and_z() {
        let mut point = vec![1u8];
        point.extend_from_slice(&1u32.to_le_bytes());
        point.extend_from_slice(&0f64.to_le_bytes());
        point.extend_from_slice(&0f64.to_le_bytes());
        assert!(read_wkb(&point).unwrap_err().to_string().contains("Point"));

        let mut polygon_z = vec![1u8];
        polygon_z.extend_from_slice(&(3u32 | FLAG_Z).to_le_bytes());
        polygon_z.extend_from_slice(&0u32.to_le_bytes());
        assert!(read_wkb(&polygon_z).unwrap_err().to_string().contains("Z/M"));

        let mut polygon_iso_z = vec![1u8];
        polygon_iso_z.extend_from_slice(&1003u32.to_le_bytes());
        polygon_iso_z.extend_from_slice(&0u32.to_le_bytes());
        assert!(read_wkb(&polygon_iso_z).is_err());
    }

    #[test]
    fn test_bad_nested_byte_order() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&6u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&[7u8; 9]);
        let err = read_wkb(&bytes).unwrap_err();
        assert!(err.to_string().contains("0x07"));
    }
}
