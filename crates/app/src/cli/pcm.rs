//! Raw PCM byte conversions (16-bit little-endian, interleaved stereo)

use anyhow::{bail, Result};

pub fn decode_s16le(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 4 != 0 {
        bail!(
            "input is {} bytes, not a whole number of 16-bit stereo frames",
            bytes.len()
        );
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

pub fn encode_s16le(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
