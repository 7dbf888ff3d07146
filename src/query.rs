//! Query Executor (C5): opens files overlapping a time window, prunes
//! blocks via the Index & Bloom Engine, decompresses survivors, applies
//! full predicates, and merges results.
//!
//! Parallel file fan-out bounded by `config.query_concurrency`, via
//! `crossbeam::thread::scope` — the same mechanism the Timeline Assembler
//! uses for its two concurrent sub-queries. No async runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tracing::{debug, warn};

use crate::block::index::{candidate_blocks, DimensionFilter};
use crate::block::{read_block, CompressionAlgo};
use crate::cancel::CancellationToken;
use crate::catalog::{discover_segment_files, files_overlapping, map_segment_file, IndexCache};
use crate::config::StoreConfig;
use crate::error::SpectreError;
use crate::model::Event;

/// A query over the store: a time window plus an identity filter.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub start_ns: i64,
    pub end_ns: i64,
    pub kinds: Vec<String>,
    pub namespaces: Vec<String>,
    /// Single-value equality (§4.5 predicate matrix); empty = wildcard.
    pub group: Option<String>,
    /// Single-value equality; empty = wildcard.
    pub version: Option<String>,
}

impl QueryRequest {
    fn validate(&self) -> Result<(), SpectreError> {
        if self.end_ns < self.start_ns {
            return Err(SpectreError::InvalidRequest(format!(
                "end_ns ({}) < start_ns ({})",
                self.end_ns, self.start_ns
            )));
        }
        Ok(())
    }

    fn dimension_filter(&self) -> DimensionFilter {
        DimensionFilter {
            kinds: self.kinds.clone(),
            namespaces: self.namespaces.clone(),
            groups: self.group.clone().into_iter().collect(),
        }
    }

    fn matches_full_predicate(&self, event: &Event) -> bool {
        if event.timestamp < self.start_ns || event.timestamp > self.end_ns {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.iter().any(|k| k == &event.resource.kind) {
            return false;
        }
        if !self.namespaces.is_empty()
            && !self.namespaces.iter().any(|ns| ns == &event.resource.namespace)
        {
            return false;
        }
        if let Some(group) = &self.group {
            if !group.is_empty() && group != &event.resource.api_group {
                return false;
            }
        }
        if let Some(version) = &self.version {
            if !version.is_empty() && version != &event.resource.api_version {
                return false;
            }
        }
        true
    }
}

/// Result of a [`QueryRequest`], per §6.2/§4.5.
#[derive(Debug, Default)]
pub struct QueryResult {
    pub events: Vec<Event>,
    pub count: usize,
    pub files_searched: usize,
    pub segments_scanned: usize,
    pub segments_skipped: usize,
    pub execution_time_ms: u64,
}

/// Executes `request` against the finalized segment files under
/// `config.data_dir`, fanning out across files with a bound of
/// `config.query_concurrency`.
pub fn execute(
    config: &StoreConfig,
    cache: &IndexCache,
    request: &QueryRequest,
    cancel: &CancellationToken,
) -> Result<QueryResult, SpectreError> {
    let started = Instant::now();
    request.validate()?;

    if cancel.is_cancelled() {
        return Err(SpectreError::Cancelled);
    }

    let all_files = discover_segment_files(&config.data_dir).map_err(SpectreError::WriteFailed)?;
    let candidates = files_overlapping(&all_files, request.start_ns, request.end_ns);

    if candidates.is_empty() || request.start_ns == request.end_ns {
        return Ok(QueryResult {
            execution_time_ms: started.elapsed().as_millis() as u64,
            files_searched: 0,
            ..Default::default()
        });
    }

    let events = Mutex::new(Vec::new());
    let segments_scanned = AtomicUsize::new(0);
    let segments_skipped = AtomicUsize::new(0);
    let files_searched = AtomicUsize::new(0);

    let concurrency = config.query_concurrency.max(1);
    let chunks: Vec<&[crate::catalog::SegmentFile]> = candidates.chunks(concurrency.max(1)).collect();

    // crossbeam::thread::scope lets worker closures borrow `config`,
    // `cache`, `request`, and the shared accumulators without cloning.
    let scan_result = crossbeam::thread::scope(|scope| {
        for chunk in &chunks {
            if cancel.is_cancelled() {
                break;
            }
            let mut handles = Vec::new();
            for file in chunk.iter() {
                let events = &events;
                let segments_scanned = &segments_scanned;
                let segments_skipped = &segments_skipped;
                let files_searched = &files_searched;
                let cancel = cancel.clone();
                handles.push(scope.spawn(move |_| {
                    scan_one_file(
                        file,
                        request,
                        cache,
                        &cancel,
                        events,
                        segments_scanned,
                        segments_skipped,
                    );
                    files_searched.fetch_add(1, Ordering::Relaxed);
                }));
            }
            for handle in handles {
                let _ = handle.join();
            }
        }
    });
    if scan_result.is_err() {
        return Err(SpectreError::Internal(
            "query worker thread panicked".into(),
        ));
    }

    if cancel.is_cancelled() {
        return Err(SpectreError::Cancelled);
    }

    let events = events.into_inner().map_err(|_| SpectreError::Internal("query result mutex poisoned".into()))?;
    let count = events.len();

    Ok(QueryResult {
        events,
        count,
        files_searched: files_searched.load(Ordering::Relaxed),
        segments_scanned: segments_scanned.load(Ordering::Relaxed),
        segments_skipped: segments_skipped.load(Ordering::Relaxed),
        execution_time_ms: started.elapsed().as_millis() as u64,
    })
}

fn scan_one_file(
    file: &crate::catalog::SegmentFile,
    request: &QueryRequest,
    cache: &IndexCache,
    cancel: &CancellationToken,
    events_out: &Mutex<Vec<Event>>,
    segments_scanned: &AtomicUsize,
    segments_skipped: &AtomicUsize,
) {
    let bytes = match map_segment_file(&file.path) {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %file.path.display(), error = %e, "failed to read segment file during query");
            return;
        }
    };

    let header = match crate::block::header::read_file_header(&bytes) {
        Ok(h) => h,
        Err(e) => {
            warn!(path = %file.path.display(), error = %e, "corrupt footer: file invisible to query");
            return;
        }
    };
    let algo = match header.compression_algo() {
        Ok(a) => a,
        Err(_) => CompressionAlgo::Zstd,
    };

    let section = match cache.get_or_parse(&file.path, &bytes) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %file.path.display(), error = %e, "corrupt index section, file skipped");
            return;
        }
    };

    let filter = request.dimension_filter();
    let (ordinals, strategy) = candidate_blocks(&section, &filter);
    let skipped = section.blocks.len().saturating_sub(ordinals.len());
    segments_skipped.fetch_add(skipped, Ordering::Relaxed);
    debug!(path = %file.path.display(), ?strategy, candidates = ordinals.len(), skipped, "computed candidate blocks");

    for ordinal in ordinals {
        if cancel.is_cancelled() {
            return;
        }
        let Some(meta) = section.blocks.iter().find(|b| b.ordinal == ordinal) else {
            continue;
        };
        let start = meta.offset as usize;
        let end = start + meta.compressed_length as usize;
        if end > bytes.len() {
            warn!(path = %file.path.display(), ordinal, "corrupt block: offset out of bounds, skipped");
            continue;
        }

        match read_block(&bytes[start..end], algo) {
            Ok((block_events, _)) => {
                segments_scanned.fetch_add(1, Ordering::Relaxed);
                let mut matched: Vec<Event> = block_events
                    .into_iter()
                    .filter(|e| request.matches_full_predicate(e))
                    .collect();
                if !matched.is_empty() {
                    let mut guard = events_out.lock().unwrap_or_else(|e| e.into_inner());
                    guard.append(&mut matched);
                }
            }
            Err(e) => {
                warn!(path = %file.path.display(), ordinal, error = %e, "corrupt block, skipped");
                segments_skipped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
