// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised at the binary geometry boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Envelope could not be read: bad hex, short input, unknown byte order
    #[error("Malformed EWKB header: {0}")]
    MalformedHeader(String),

    /// Envelope was fine but the geometry body could not be parsed or written
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}
