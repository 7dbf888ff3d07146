//! Store-wide configuration: one struct gathering every tunable so callers
//! can construct a `Store` with sane defaults or override specific knobs.

use std::path::PathBuf;

use crate::block::CompressionAlgo;
use crate::buffer::{clamp_block_size_target, DEFAULT_BLOCK_SIZE_TARGET};
use crate::block::index::BLOOM_FALSE_POSITIVE_RATE;

/// Default bound on concurrent file fan-out during a query, when the
/// caller does not supply one (§5: "bounded by a caller-supplied limit,
/// default ≤ cores").
pub fn default_query_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Default bounded-LRU capacity for cached, parsed index sections.
pub const DEFAULT_INDEX_CACHE_CAPACITY: usize = 256;

/// Top-level store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory segment files are written to and discovered from.
    pub data_dir: PathBuf,
    /// Target uncompressed block size; clamped to [32 KiB, 1 MiB].
    pub block_size_target: usize,
    /// Compression algorithm used for newly written blocks. Readers
    /// accept both `gzip` and `zstd` regardless of this setting.
    pub compression: CompressionAlgo,
    /// Whether to compute and verify block checksums.
    pub checksum_enabled: bool,
    /// Target false-positive rate for per-block bloom filters.
    pub bloom_false_positive_rate: f64,
    /// Bound on concurrent file fan-out during a query.
    pub query_concurrency: usize,
    /// Bounded-LRU capacity for cached, parsed index sections.
    pub index_cache_capacity: usize,
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            block_size_target: DEFAULT_BLOCK_SIZE_TARGET,
            compression: CompressionAlgo::Zstd,
            checksum_enabled: true,
            bloom_false_positive_rate: BLOOM_FALSE_POSITIVE_RATE,
            query_concurrency: default_query_concurrency(),
            index_cache_capacity: DEFAULT_INDEX_CACHE_CAPACITY,
        }
    }

    pub fn with_block_size_target(mut self, target: usize) -> Self {
        self.block_size_target = clamp_block_size_target(target);
        self
    }

    pub fn with_compression(mut self, algo: CompressionAlgo) -> Self {
        self.compression = algo;
        self
    }

    pub fn with_query_concurrency(mut self, limit: usize) -> Self {
        self.query_concurrency = limit.max(1);
        self
    }
}
