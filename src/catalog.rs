//! File catalog: discovers finalized segment files on disk and memoizes
//! their parsed index sections behind a bounded LRU.
//!
//! The cache is a `quick_cache::sync::Cache` keyed by path, item-count-weighted
//! via `UnitWeighter`. Segment files themselves are read via
//! [`map_segment_file`], a read-only `memmap2::Mmap` view rather than a
//! full `std::fs::read` copy.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use quick_cache::sync::{Cache, DefaultLifecycle};
use quick_cache::UnitWeighter;
use tracing::{debug, warn};

use crate::block::header::{read_file_footer, read_file_header};
use crate::block::index::{read_index_section, IndexSection};
use crate::block::CodecError;

/// One discovered, finalized segment file: its path and partition key
/// (derived from the filename), with header/footer validated but the
/// index section not yet necessarily loaded.
#[derive(Debug, Clone)]
pub struct SegmentFile {
    pub path: PathBuf,
    pub partition_key: String,
}

/// Lists finalized `*.dat` files under `data_dir`, sorted by partition key.
/// A file is only finalized if its footer validates; anything else
/// (in-progress `.tmp` files, truncated files) is silently skipped — a
/// file without a valid footer is invisible to readers.
pub fn discover_segment_files(data_dir: &Path) -> std::io::Result<Vec<SegmentFile>> {
    let mut files = Vec::new();
    let entries = match fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("dat") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let bytes = match map_segment_file(&path) {
            Ok(b) => b,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read candidate segment file");
                continue;
            }
        };
        if read_file_header(&bytes).is_err() || read_file_footer(&bytes).is_err() {
            debug!(path = %path.display(), "skipping file without valid header/footer");
            continue;
        }

        files.push(SegmentFile {
            path,
            partition_key: stem.to_string(),
        });
    }

    files.sort_by(|a, b| a.partition_key.cmp(&b.partition_key));
    Ok(files)
}

/// Memory-maps a segment file for reading.
///
/// # Safety
///
/// `Mmap::map` is unsafe because the mapping is undefined behavior if the
/// file is truncated or mutated concurrently. Segment files are written
/// only once, to a `.tmp` path, then made visible via an atomic rename
/// (see `segment::SegmentWriter::finalize`) — by the time a path reaches
/// this function it is finalized and never written to again.
pub fn map_segment_file(path: &Path) -> std::io::Result<Mmap> {
    let file = File::open(path)?;
    unsafe { Mmap::map(&file) }
}

/// Returns the subset of `files` whose partition overlaps `[start_ns, end_ns]`.
/// Partition keys are `YYYY-MM-DD-HH`; a file's hour bucket spans
/// `[hour_start, hour_start + 1h)`.
pub fn files_overlapping(files: &[SegmentFile], start_ns: i64, end_ns: i64) -> Vec<SegmentFile> {
    files
        .iter()
        .filter(|f| match partition_bounds_ns(&f.partition_key) {
            Some((p_start, p_end)) => p_start < end_ns && p_end > start_ns,
            None => true, // unknown naming scheme: don't risk skipping data
        })
        .cloned()
        .collect()
}

fn partition_bounds_ns(key: &str) -> Option<(i64, i64)> {
    let parts: Vec<&str> = key.split('-').collect();
    if parts.len() != 4 {
        return None;
    }
    let year: i64 = parts[0].parse().ok()?;
    let month: i64 = parts[1].parse().ok()?;
    let day: i64 = parts[2].parse().ok()?;
    let hour: i64 = parts[3].parse().ok()?;

    let days_since_epoch = civil_days_from_ymd(year, month, day)?;
    let start = (days_since_epoch * 86_400 + hour * 3600) * 1_000_000_000;
    let end = start + 3600 * 1_000_000_000;
    Some((start, end))
}

/// Howard Hinnant's days-from-civil algorithm, proleptic Gregorian, days
/// since 1970-01-01.
fn civil_days_from_ymd(y: i64, m: i64, d: i64) -> Option<i64> {
    if !(1..=12).contains(&m) || !(1..=31).contains(&d) {
        return None;
    }
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let mp = ((m + 9) % 12) as u64;
    let doy = (153 * mp + 2) / 5 + d as u64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    Some(era * 146_097 + doe as i64 - 719_468)
}

/// Bounded LRU of parsed index sections, keyed by file path, amortizing
/// repeated queries over the same file (§5's "per-file read cache").
pub struct IndexCache {
    inner: Cache<PathBuf, Arc<IndexSection>, UnitWeighter, std::collections::hash_map::RandomState>,
}

impl IndexCache {
    pub fn new(capacity: usize) -> Self {
        let inner = Cache::with(
            capacity.max(1),
            capacity.max(1) as u64,
            UnitWeighter,
            std::collections::hash_map::RandomState::default(),
            DefaultLifecycle::default(),
        );
        Self { inner }
    }

    /// Returns the cached index section for `path`, parsing and caching it
    /// from `file_bytes` if absent.
    pub fn get_or_parse(
        &self,
        path: &Path,
        file_bytes: &[u8],
    ) -> Result<Arc<IndexSection>, CodecError> {
        if let Some(cached) = self.inner.get(path) {
            return Ok(cached);
        }

        let footer = read_file_footer(file_bytes)?;
        let start = footer.index_section_offset as usize;
        let end = start + footer.index_section_length as usize;
        if end > file_bytes.len() {
            return Err(CodecError::CorruptIndex(
                "index section bounds exceed file length".into(),
            ));
        }
        let section = Arc::new(read_index_section(&file_bytes[start..end])?);
        self.inner.insert(path.to_path_buf(), section.clone());
        Ok(section)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_bounds_cover_one_hour() {
        let (start, end) = partition_bounds_ns("2025-01-01-10").unwrap();
        assert_eq!(end - start, 3600 * 1_000_000_000);
    }

    #[test]
    fn files_overlapping_filters_by_window() {
        let files = vec![
            SegmentFile {
                path: PathBuf::from("2025-01-01-10.dat"),
                partition_key: "2025-01-01-10".into(),
            },
            SegmentFile {
                path: PathBuf::from("2025-01-01-11.dat"),
                partition_key: "2025-01-01-11".into(),
            },
            SegmentFile {
                path: PathBuf::from("2025-01-01-12.dat"),
                partition_key: "2025-01-01-12".into(),
            },
        ];
        let (start, _) = partition_bounds_ns("2025-01-01-10").unwrap();
        let (_, end) = partition_bounds_ns("2025-01-01-11").unwrap();
        let matched = files_overlapping(&files, start + 1800 * 1_000_000_000, end - 1_000_000_000);
        let keys: Vec<_> = matched.iter().map(|f| f.partition_key.as_str()).collect();
        assert_eq!(keys, vec!["2025-01-01-10", "2025-01-01-11"]);
    }

    #[test]
    fn discover_skips_nonexistent_dir() {
        let files = discover_segment_files(Path::new("/nonexistent/spectre/data")).unwrap();
        assert!(files.is_empty());
    }
}
