//! Block read/write: compress a batch of events, frame it with a length
//! prefix and CRC32 trailer, and the inverse.
//!
//! On-disk block framing: `[u32 len][compressed bytes][u32 crc32]`.

use std::io::{Read, Write};

use crc32fast::Hasher as Crc32;

use crate::encoding::{self, EncodingError};
use crate::model::Event;

use super::{CodecError, CompressionAlgo};

fn compress(algo: CompressionAlgo, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    match algo {
        CompressionAlgo::Gzip => {
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(data)
                .map_err(CodecError::Io)?;
            encoder.finish().map_err(CodecError::Io)
        }
        CompressionAlgo::Zstd => {
            zstd::stream::encode_all(data, 0).map_err(CodecError::Io)
        }
    }
}

fn decompress(algo: CompressionAlgo, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    match algo {
        CompressionAlgo::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CodecError::CorruptBlock(format!("gzip: {e}")))?;
            Ok(out)
        }
        CompressionAlgo::Zstd => zstd::stream::decode_all(data)
            .map_err(|e| CodecError::CorruptBlock(format!("zstd: {e}"))),
    }
}

/// Serializes `events`, compresses the payload with `algo`, and frames it
/// as `[u32 len][bytes][u32 crc32]`. Returns the framed bytes, ready to be
/// appended to a segment file.
pub fn write_block(events: &[Event], algo: CompressionAlgo) -> Result<Vec<u8>, CodecError> {
    let mut raw = Vec::new();
    encoding::encode_vec(events, &mut raw)?;
    let compressed = compress(algo, &raw)?;

    let mut framed = Vec::with_capacity(compressed.len() + 8);
    let len = u32::try_from(compressed.len())
        .map_err(|_| CodecError::Internal("block payload exceeds u32::MAX".into()))?;
    framed.extend_from_slice(&len.to_le_bytes());
    framed.extend_from_slice(&compressed);

    let mut hasher = Crc32::new();
    hasher.update(&compressed);
    framed.extend_from_slice(&hasher.finalize().to_le_bytes());

    Ok(framed)
}

/// Reads one framed block starting at `buf[0]`, verifying its checksum and
/// decompressing its payload. Returns `(events, bytes_consumed)`.
pub fn read_block(buf: &[u8], algo: CompressionAlgo) -> Result<(Vec<Event>, usize), CodecError> {
    if buf.len() < 8 {
        return Err(CodecError::CorruptBlock("buffer too small for block frame".into()));
    }
    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let body_start = 4;
    let body_end = body_start
        .checked_add(len)
        .ok_or_else(|| CodecError::CorruptBlock("block length overflow".into()))?;
    let crc_end = body_end + 4;
    if buf.len() < crc_end {
        return Err(CodecError::CorruptBlock(format!(
            "block frame truncated: need {crc_end} bytes, have {}",
            buf.len()
        )));
    }

    let compressed = &buf[body_start..body_end];
    let expected_crc = u32::from_le_bytes([
        buf[body_end],
        buf[body_end + 1],
        buf[body_end + 2],
        buf[body_end + 3],
    ]);

    let mut hasher = Crc32::new();
    hasher.update(compressed);
    let actual_crc = hasher.finalize();
    if actual_crc != expected_crc {
        return Err(CodecError::CorruptBlock(format!(
            "checksum mismatch: expected {expected_crc:08x}, got {actual_crc:08x}"
        )));
    }

    let raw = decompress(algo, compressed)?;
    let (events, consumed) = encoding::decode_vec::<Event>(&raw)
        .map_err(|e: EncodingError| CodecError::CorruptBlock(e.to_string()))?;
    if consumed != raw.len() {
        return Err(CodecError::CorruptBlock(
            "trailing bytes after decoded event vector".into(),
        ));
    }

    Ok((events, crc_end))
}
