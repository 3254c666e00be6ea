//! Tile payload compression.
//!
//! Tiles are gzip-compressed by default, which is what tile servers expect to
//! hand out with `Content-Encoding: gzip`. Decompression sniffs the gzip magic
//! bytes so raw protobuf tiles can be read through the same path.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;

use crate::Result;

/// Gzip member header magic
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression applied to the encoded tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    None,
    #[default]
    Gzip,
}

impl Compression {
    /// Get a human-readable name for this compression type.
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
        }
    }
}

/// Compress data using the specified algorithm.
///
/// Returns a copy of the input when compression is `None`.
pub fn compress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => compress_gzip(data),
    }
}

/// Compress data with gzip at the default level.
fn compress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), GzCompression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// True if the data starts with a gzip header.
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Decompress gzip data; anything else is returned unchanged.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if !is_gzip(data) {
        return Ok(data.to_vec());
    }
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
