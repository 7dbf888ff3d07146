//! Crate-level error taxonomy, aggregating every module's error type
//! behind one enum via `#[from]`.

use std::io;

use thiserror::Error;

use crate::block::CodecError;
use crate::encoding::EncodingError;
use crate::segment::SegmentError;

/// Errors surfaced by the public API of the core.
#[derive(Debug, Error)]
pub enum SpectreError {
    /// Malformed filters, `end < start`, unparseable timestamps.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// File header declares an unsupported major version.
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(String),

    /// File header declares an unrecognized compression or encoding.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Block checksum failed or the decoder errored; recovered locally
    /// by the Query Executor, surfaced here only when propagated
    /// explicitly (e.g. strict-mode callers).
    #[error("corrupt block: {0}")]
    CorruptBlock(String),

    /// Index section failed to decode.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// Footer magic or size invalid; the file is treated as absent.
    #[error("corrupt footer: {0}")]
    CorruptFooter(String),

    /// Disk I/O error during ingestion, surfaced to the ingestor
    /// immediately. The writer never retries on its own.
    #[error("write failed: {0}")]
    WriteFailed(#[from] io::Error),

    /// The operation's cancellation token was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Programmer error / invariant violation. Never masked.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EncodingError> for SpectreError {
    fn from(err: EncodingError) -> Self {
        SpectreError::Internal(err.to_string())
    }
}

impl From<SegmentError> for SpectreError {
    fn from(err: SegmentError) -> Self {
        match err {
            SegmentError::Io(e) => SpectreError::WriteFailed(e),
            SegmentError::Codec(e) => e.into(),
        }
    }
}

impl From<CodecError> for SpectreError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => SpectreError::WriteFailed(e),
            CodecError::Encoding(e) => SpectreError::Internal(e.to_string()),
            CodecError::CorruptFooter(msg) => SpectreError::CorruptFooter(msg),
            CodecError::CorruptIndex(msg) => SpectreError::CorruptIndex(msg),
            CodecError::CorruptBlock(msg) => SpectreError::CorruptBlock(msg),
            CodecError::UnsupportedVersion(msg) => SpectreError::UnsupportedVersion(msg),
            CodecError::UnsupportedEncoding(msg) => SpectreError::UnsupportedEncoding(msg),
            CodecError::Internal(msg) => SpectreError::Internal(msg),
        }
    }
}
