//! Block Codec (C1) — serializes and parses the on-disk file format:
//! header, blocks, index section, footer.
//!
//! # On-disk layout
//!
//! ```text
//! [FILE HEADER, 77 bytes]
//! [BLOCK][BLOCK]...                     <- compressed, length+checksum framed
//! [INDEX SECTION]                       <- self-describing blob
//! [FILE FOOTER, 324 bytes]
//! ```
//!
//! A block carries no on-disk header of its own; its byte range is recovered
//! solely from its [`BlockMetadata`] entry in the index section (see
//! [`index`]) rather than from a self-describing per-block header.
//!
//! # Guarantees
//!
//! - Round-trip: `read_x(write_x(X)) == X` for header, block, index section,
//!   and footer.
//! - Unknown compression algorithms fail with [`CodecError::UnsupportedEncoding`],
//!   never silently drop data.
//! - Major version mismatches fail with [`CodecError::UnsupportedVersion`];
//!   minor version differences are accepted.

pub mod header;
pub mod index;

mod codec;

#[cfg(test)]
mod tests;

pub use codec::{read_block, write_block};
pub use header::{FileFooter, FileHeader};
pub use index::{
    candidate_blocks, BlockBloomSet, BlockBlooms, BlockMetadata, CandidateStrategy,
    DimensionFilter, IndexSection, InvertedIndex, Statistics,
};

use std::io;

use thiserror::Error;

use crate::encoding::EncodingError;

/// Magic bytes identifying a Spectre block-structured file header.
pub const FILE_HEADER_MAGIC: [u8; 8] = *b"RPKBLOCK";
/// Magic bytes identifying a Spectre block-structured file footer.
pub const FILE_FOOTER_MAGIC: [u8; 6] = *b"RPKEND";

/// Current format major version. Readers accept any `FORMAT_VERSION_MAJOR.x`.
pub const FORMAT_VERSION_MAJOR: u32 = 1;

pub const FILE_HEADER_SIZE: usize = 77;
pub const FILE_FOOTER_SIZE: usize = 324;

/// Compression algorithm used for block payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionAlgo {
    Gzip,
    Zstd,
}

impl CompressionAlgo {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CodecError> {
        match s {
            "gzip" => Ok(Self::Gzip),
            "zstd" => Ok(Self::Zstd),
            other => Err(CodecError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Errors returned by block codec operations (header, block, index, footer).
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Encoding / decoding error from the wire-format layer.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// File header/footer magic did not match.
    #[error("corrupt footer: {0}")]
    CorruptFooter(String),

    /// Index section failed to decode.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// Block checksum mismatch or decompression failure.
    #[error("corrupt block: {0}")]
    CorruptBlock(String),

    /// File header declares an unsupported major version.
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(String),

    /// File header declares an unrecognized compression algorithm.
    #[error("unsupported compression encoding: {0}")]
    UnsupportedEncoding(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}
