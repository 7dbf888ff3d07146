//! Segment Writer (C3): drives the Event Buffer and Block Codec over one
//! wall-clock-hour partition, producing a finalized, footer-committed file.
//!
//! Temp-file-then-atomic-rename write path: the final write (here, the
//! footer) is the sole commit point.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::block::header::{compute_index_checksum, write_file_footer, write_file_header};
use crate::block::index::{
    BlockBloomSet, BlockBlooms, IndexSection, InvertedIndex, Statistics, INDEX_SECTION_VERSION,
};
use crate::block::{write_block, BlockMetadata, CodecError, CompressionAlgo, FileFooter, FileHeader, FILE_HEADER_SIZE};
use crate::buffer::EventBuffer;
use crate::model::Event;

/// Errors specific to the Segment Writer.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Formats the partition key (hour bucket) for `timestamp_ns`, used both
/// for the filename and to detect a partition rollover.
pub fn partition_key(timestamp_ns: i64) -> String {
    let secs = timestamp_ns.div_euclid(1_000_000_000);
    let datetime = unix_secs_to_utc_parts(secs);
    format!(
        "{:04}-{:02}-{:02}-{:02}",
        datetime.0, datetime.1, datetime.2, datetime.3
    )
}

/// Minimal, dependency-free civil-calendar conversion from Unix seconds to
/// `(year, month, day, hour)`, UTC. Only the hour bucket is needed for
/// partitioning, so fractional seconds are discarded.
fn unix_secs_to_utc_parts(secs: i64) -> (i64, u32, u32, u32) {
    const SECS_PER_DAY: i64 = 86_400;
    let days = secs.div_euclid(SECS_PER_DAY);
    let remaining = secs.rem_euclid(SECS_PER_DAY);
    let hour = (remaining / 3600) as u32;

    // Civil-from-days algorithm (Howard Hinnant), proleptic Gregorian.
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if m <= 2 { y + 1 } else { y };

    (year, m, d, hour)
}

/// Filename for a segment covering the given partition key.
pub fn segment_filename(key: &str) -> String {
    format!("{key}.dat")
}

/// Drives one open segment file: accumulates events via an [`EventBuffer`],
/// seals blocks through the Block Codec, and finalizes with an index
/// section + footer as the atomic commit point.
pub struct SegmentWriter {
    data_dir: PathBuf,
    compression: CompressionAlgo,
    checksum_enabled: bool,
    partition_key: String,
    tmp_path: PathBuf,
    final_path: PathBuf,
    file: File,
    buffer: EventBuffer,
    sealed_blocks: Vec<BlockMetadata>,
    block_kind_sets: Vec<Vec<String>>,
    block_namespace_sets: Vec<Vec<String>>,
    block_group_sets: Vec<Vec<String>>,
    next_offset: u64,
}

impl SegmentWriter {
    /// Opens a new segment file for the partition covering `first_event_ts`.
    pub fn create(
        data_dir: impl Into<PathBuf>,
        first_event_ts: i64,
        block_size_target: usize,
        compression: CompressionAlgo,
        checksum_enabled: bool,
    ) -> Result<Self, SegmentError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let partition_key = partition_key(first_event_ts);
        let final_path = data_dir.join(segment_filename(&partition_key));
        let tmp_path = final_path.with_extension("dat.tmp");

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let header = FileHeader::new(compression, block_size_target as u64, checksum_enabled, first_event_ts);
        let header_bytes = write_file_header(&header)?;
        file.write_all(&header_bytes)?;
        debug_assert_eq!(header_bytes.len(), FILE_HEADER_SIZE);

        info!(partition = %partition_key, path = %tmp_path.display(), "opened segment file");

        Ok(Self {
            data_dir,
            compression,
            checksum_enabled,
            partition_key,
            tmp_path,
            final_path,
            file,
            buffer: EventBuffer::new(block_size_target),
            sealed_blocks: Vec::new(),
            block_kind_sets: Vec::new(),
            block_namespace_sets: Vec::new(),
            block_group_sets: Vec::new(),
            next_offset: FILE_HEADER_SIZE as u64,
        })
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn checksum_enabled(&self) -> bool {
        self.checksum_enabled
    }

    /// Returns true if `timestamp_ns` falls in a different hour than the
    /// partition this writer is currently open for.
    pub fn is_rollover(&self, timestamp_ns: i64) -> bool {
        partition_key(timestamp_ns) != self.partition_key
    }

    /// Appends `event`, sealing and flushing the current block first if it
    /// is full.
    pub fn append(&mut self, event: Event) -> Result<(), SegmentError> {
        if let Err(rejected) = self.buffer.try_add_event(event) {
            self.flush_buffer()?;
            // Buffer is now empty; this always succeeds (or the event is
            // simply too large, admitted into the fresh empty buffer).
            let _ = self.buffer.try_add_event(rejected);
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<(), SegmentError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let kinds: Vec<String> = self.buffer.kinds().iter().cloned().collect();
        let namespaces: Vec<String> = self.buffer.namespaces().iter().cloned().collect();
        let groups: Vec<String> = self.buffer.groups().iter().cloned().collect();
        let min_ts = self.buffer.min_timestamp().unwrap_or_default();
        let max_ts = self.buffer.max_timestamp().unwrap_or_default();
        let event_count = self.buffer.len() as u64;

        let events = self.buffer.seal();
        let uncompressed_len: usize = events.iter().map(|e| e.data.len() + e.id.len() + 64).sum();
        let framed = write_block(&events, self.compression)?;

        self.file.write_all(&framed)?;

        let ordinal = self.sealed_blocks.len() as u32;
        self.sealed_blocks.push(BlockMetadata {
            ordinal,
            offset: self.next_offset,
            compressed_length: framed.len() as u64,
            uncompressed_length: uncompressed_len as u64,
            event_count,
            min_timestamp: min_ts,
            max_timestamp: max_ts,
        });
        self.block_kind_sets.push(kinds);
        self.block_namespace_sets.push(namespaces);
        self.block_group_sets.push(groups);
        self.next_offset += framed.len() as u64;

        debug!(ordinal, event_count, "sealed block");
        Ok(())
    }

    /// Flushes any remaining buffered events, builds the index section,
    /// and atomically commits the file by writing the footer and renaming
    /// into place. Returns the final path.
    pub fn finalize(mut self) -> Result<PathBuf, SegmentError> {
        self.flush_buffer()?;

        let inverted_index = InvertedIndex::build(self.sealed_blocks.iter().enumerate().flat_map(
            |(i, _)| {
                let kinds = &self.block_kind_sets[i];
                let namespaces = &self.block_namespace_sets[i];
                let groups = &self.block_group_sets[i];
                kinds.iter().flat_map(move |k| {
                    namespaces.iter().flat_map(move |ns| {
                        groups.iter().map(move |g| (i as u32, k.as_str(), ns.as_str(), g.as_str()))
                    })
                })
            },
        ));

        let blooms = BlockBlooms(
            (0..self.sealed_blocks.len())
                .map(|i| {
                    BlockBloomSet::build(
                        &self.block_kind_sets[i],
                        &self.block_namespace_sets[i],
                        &self.block_group_sets[i],
                    )
                })
                .collect(),
        );

        let statistics = self.compute_statistics();

        let index_section = IndexSection {
            version: INDEX_SECTION_VERSION,
            blocks: self.sealed_blocks.clone(),
            inverted_index,
            blooms,
            statistics,
        };

        let index_bytes = crate::block::index::write_index_section(&index_section)?;
        let index_offset = self.next_offset;
        self.file.write_all(&index_bytes)?;

        let checksum = compute_index_checksum(&index_bytes);
        let footer = FileFooter {
            index_section_offset: index_offset,
            index_section_length: index_bytes.len() as u64,
            checksum,
        };
        let footer_bytes = write_file_footer(&footer)?;
        self.file.write_all(&footer_bytes)?;
        self.file.sync_all()?;

        // Atomic commit point: rename only after every byte is durable.
        fs::rename(&self.tmp_path, &self.final_path)?;
        info!(
            path = %self.final_path.display(),
            blocks = self.sealed_blocks.len(),
            index_bytes = footer.index_section_length,
            "finalized segment file"
        );

        Ok(self.final_path)
    }

    fn compute_statistics(&self) -> Statistics {
        let mut kinds = std::collections::BTreeSet::new();
        let mut namespaces = std::collections::BTreeSet::new();
        let mut groups = std::collections::BTreeSet::new();
        for (k, (ns, g)) in self
            .block_kind_sets
            .iter()
            .zip(self.block_namespace_sets.iter().zip(self.block_group_sets.iter()))
        {
            kinds.extend(k.iter().cloned());
            namespaces.extend(ns.iter().cloned());
            groups.extend(g.iter().cloned());
        }

        let total_events: u64 = self.sealed_blocks.iter().map(|b| b.event_count).sum();
        let total_uncompressed_bytes: u64 =
            self.sealed_blocks.iter().map(|b| b.uncompressed_length).sum();
        let total_compressed_bytes: u64 = self.sealed_blocks.iter().map(|b| b.compressed_length).sum();
        let timestamp_min = self.sealed_blocks.iter().map(|b| b.min_timestamp).min().unwrap_or(0);
        let timestamp_max = self.sealed_blocks.iter().map(|b| b.max_timestamp).max().unwrap_or(0);

        Statistics {
            total_blocks: self.sealed_blocks.len() as u64,
            total_events,
            total_uncompressed_bytes,
            total_compressed_bytes,
            unique_kinds: kinds.len() as u64,
            unique_namespaces: namespaces.len() as u64,
            unique_groups: groups.len() as u64,
            timestamp_min,
            timestamp_max,
        }
    }

    /// Abandons this writer without finalizing; the partial `.tmp` file is
    /// left on disk (harmless: readers never see it, it has no footer).
    /// Used when the caller hits a `WriteFailed` it cannot recover from.
    pub fn abandon(self) {
        warn!(path = %self.tmp_path.display(), "abandoning segment writer without finalizing");
    }
}

/// Reads the whole contents of a finalized segment file into memory.
/// Convenience for small-scale tests; production readers should prefer a
/// memory-mapped view (see `catalog`).
pub fn read_file_bytes(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}
