//! Flag-byte compression envelope.
//!
//! ```text
//! 0 | data          stored verbatim
//! 1 | zlib(data)    compressed
//! ```
//!
//! The compressed form is used only when it is strictly shorter than the
//! input, so incompressible data costs exactly one extra byte.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Result, XipherError};

pub const FLAG_STORED: u8 = 0;
pub const FLAG_ZLIB: u8 = 1;

fn zlib_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| XipherError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| XipherError::Compression(e.to_string()))
}

/// Wrap `data` in a compression envelope.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let compressed = zlib_compress(data)?;
    let (flag, payload) = if compressed.len() < data.len() {
        (FLAG_ZLIB, &compressed[..])
    } else {
        (FLAG_STORED, data)
    };

    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(flag);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Wrap `data` without attempting compression.
pub fn store(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + data.len());
    out.push(FLAG_STORED);
    out.extend_from_slice(data);
    out
}

/// Unwrap a compression envelope, dispatching on the flag byte.
pub fn decompress(envelope: &[u8]) -> Result<Vec<u8>> {
    let (&flag, payload) = envelope
        .split_first()
        .ok_or_else(|| XipherError::Compression("empty envelope".to_string()))?;

    match flag {
        FLAG_STORED => Ok(payload.to_vec()),
        FLAG_ZLIB => {
            let mut data = Vec::new();
            ZlibDecoder::new(payload)
                .read_to_end(&mut data)
                .map_err(|e| XipherError::Compression(e.to_string()))?;
            Ok(data)
        }
        other => Err(XipherError::Compression(format!(
            "unknown compression flag {}",
            other
        ))),
    }
}
