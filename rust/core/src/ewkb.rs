// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! EWKB envelope handling
//!
//! PostGIS returns geometries as EWKB: standard WKB whose type word may carry
//! an SRID flag (`0x20000000`) followed by a 4-byte SRID. The in-memory
//! [`Geometry`] has no coordinate-system tag, so decoding excises the SRID
//! and clears the flag before handing the bytes to the WKB reader.
//!
//! Input may be raw binary or hex text. Raw WKB always starts with a byte
//! order marker (`0x00` or `0x01`), hex text always starts with an ASCII
//! digit, so the two are told apart by the first byte.

use std::borrow::Cow;

use crate::error::{CodecError, Result};
use crate::geometry::{Geometry, GeometryKind};
use crate::reader::{self, FLAG_SRID};
use crate::writer;

/// Byte order marker plus type word
const HEADER_LEN: usize = 5;
const SRID_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    fn read_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Big => u32::from_be_bytes(bytes),
            ByteOrder::Little => u32::from_le_bytes(bytes),
        }
    }

    fn write_u32(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::Big => value.to_be_bytes(),
            ByteOrder::Little => value.to_le_bytes(),
        }
    }
}

#[inline]
fn looks_like_hex(input: &[u8]) -> bool {
    input.first().is_some_and(|b| b.is_ascii_hexdigit())
}

/// Turn hex text into bytes; binary input is borrowed unchanged.
fn to_binary(input: &[u8]) -> Result<Cow<'_, [u8]>> {
    if looks_like_hex(input) {
        let bytes = hex::decode(input)
            .map_err(|e| CodecError::MalformedHeader(format!("invalid hex: {e}")))?;
        Ok(Cow::Owned(bytes))
    } else {
        Ok(Cow::Borrowed(input))
    }
}

fn read_type_word(wkb: &[u8]) -> Result<(ByteOrder, u32)> {
    if wkb.len() < HEADER_LEN {
        return Err(CodecError::MalformedHeader(format!(
            "expected at least {HEADER_LEN} bytes, got {}",
            wkb.len()
        )));
    }
    let order = match wkb[0] {
        0 => ByteOrder::Big,
        1 => ByteOrder::Little,
        other => {
            return Err(CodecError::MalformedHeader(format!(
                "invalid byte order marker 0x{other:02x}"
            )))
        }
    };
    let word = order.read_u32([wkb[1], wkb[2], wkb[3], wkb[4]]);
    Ok((order, word))
}

/// Remove the SRID from a binary EWKB blob.
///
/// Returns the input untouched when the SRID flag is clear. Otherwise returns
/// a copy with the flag cleared (in the blob's own byte order) and the four
/// SRID bytes dropped, which is plain WKB.
pub fn strip_srid(wkb: &[u8]) -> Result<Cow<'_, [u8]>> {
    let (order, word) = read_type_word(wkb)?;
    if word & FLAG_SRID == 0 {
        return Ok(Cow::Borrowed(wkb));
    }
    if wkb.len() < HEADER_LEN + SRID_LEN {
        return Err(CodecError::MalformedHeader(format!(
            "SRID flag set but only {} bytes present",
            wkb.len()
        )));
    }

    let mut out = Vec::with_capacity(wkb.len() - SRID_LEN);
    out.push(wkb[0]);
    out.extend_from_slice(&order.write_u32(word & !FLAG_SRID));
    out.extend_from_slice(&wkb[HEADER_LEN + SRID_LEN..]);
    Ok(Cow::Owned(out))
}

/// SRID carried by an EWKB blob (hex or binary), if any.
pub fn srid(input: &[u8]) -> Result<Option<u32>> {
    let binary = to_binary(input)?;
    let (order, word) = read_type_word(&binary)?;
    if word & FLAG_SRID == 0 {
        return Ok(None);
    }
    match binary.get(HEADER_LEN..HEADER_LEN + SRID_LEN) {
        Some(b) => Ok(Some(order.read_u32([b[0], b[1], b[2], b[3]]))),
        None => Err(CodecError::MalformedHeader(
            "SRID flag set but SRID field is truncated".to_string(),
        )),
    }
}

/// Decode one EWKB (or plain WKB) geometry, hex or binary.
///
/// `None` and empty input decode to [`Geometry::Empty`]; a NULL column is not
/// an error at this layer.
pub fn decode(input: Option<&[u8]>) -> Result<Geometry> {
    let raw = match input {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Ok(Geometry::Empty),
    };
    let binary = to_binary(raw)?;
    let wkb = strip_srid(&binary)?;
    reader::read_wkb(&wkb)
}

/// Decode hex-encoded EWKB, as produced by PostGIS text output.
pub fn decode_hex(hex: &str) -> Result<Geometry> {
    decode(Some(hex.as_bytes()))
}

/// Classify a blob from its header alone, without parsing the body.
pub fn peek_kind(input: &[u8]) -> Result<GeometryKind> {
    let binary = to_binary(input)?;
    read_type_word(&binary)?;
    let (_, head) = reader::header(&binary)
        .map_err(|_| CodecError::MalformedHeader("unreadable type word".to_string()))?;
    Ok(head.kind())
}

/// Encode to plain little-endian WKB with no SRID.
pub fn encode(geometry: &Geometry) -> Result<Vec<u8>> {
    writer::write_wkb(geometry)
}

/// Encode to lowercase hex WKB.
pub fn encode_hex(geometry: &Geometry) -> Result<String> {
    encode(geometry).map(hex::encode)
}
