//! Gzip helpers.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::TransportError;

pub fn compress(data: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| TransportError::Compress(format!("gzip compression failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| TransportError::Compress(format!("gzip finalization failed: {e}")))
}

/// Upper bound on a decompressed body.
pub const MAX_DECOMPRESSED_BYTES: usize = 16 * 1024 * 1024;

pub fn decompress(data: &[u8]) -> Result<Vec<u8>, TransportError> {
    decompress_limited(data, MAX_DECOMPRESSED_BYTES)
}

/// Decompress at most `limit` bytes; a larger output is rejected.
pub fn decompress_limited(data: &[u8], limit: usize) -> Result<Vec<u8>, TransportError> {
    let mut decoder = GzDecoder::new(data).take(limit as u64 + 1);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| TransportError::Compress(format!("gzip decompression failed: {e}")))?;
    if decompressed.len() > limit {
        return Err(TransportError::Compress(format!(
            "decompressed body exceeds {limit} bytes"
        )));
    }
    Ok(decompressed)
}
