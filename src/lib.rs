//! # Spectre
//!
//! A block-structured event store and timeline query engine for cluster
//! observability. Spectre ingests a stream of resource-change [`Event`]s,
//! packs them into compressed, checksummed, indexed blocks on disk, and
//! answers two kinds of question over them: ad-hoc filtered queries, and
//! assembled per-resource status timelines correlated with native
//! Kubernetes events.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                            Store                                │
//! │  ┌────────────┐   seal    ┌───────────────┐   finalize          │
//! │  │   Event    │ ────────► │   Segment     │ ───────► *.dat file │
//! │  │  Buffer     │          │   Writer      │   (header, blocks,  │
//! │  └────────────┘          └───────────────┘    index, footer)   │
//! │                                                                  │
//! │  ┌────────────┐  discover  ┌───────────────┐  candidate_blocks  │
//! │  │  Catalog    │ ────────► │ Query Executor │ ───────────────►  │
//! │  │ (+ index     │          │  (fan-out via  │   Index & Bloom   │
//! │  │  cache)      │          │   crossbeam)   │   Engine           │
//! │  └────────────┘          └──────┬────────┘                     │
//! │                                  │                               │
//! │                                  ▼                               │
//! │                          ┌───────────────┐                      │
//! │                          │   Timeline     │  status inference   │
//! │                          │   Assembler    │ ───────────────►    │
//! │                          └───────────────┘   per-kind rules     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`model`] | Core data model: `Event`, `ResourceMetadata`, `K8sEvent`, `StatusSegment` |
//! | [`encoding`] | Deterministic binary wire format shared by every on-disk structure |
//! | [`block`] | Block codec, file header/footer, index section, inverted index, bloom filters |
//! | [`buffer`] | In-memory event accumulator that seals blocks at a target size |
//! | [`segment`] | Segment writer: buffer → compressed blocks → indexed, finalized file |
//! | [`catalog`] | Segment file discovery and a bounded LRU of parsed index sections |
//! | [`query`] | Query executor: time-window + identity filter over finalized segments |
//! | [`timeline`] | Timeline assembler: per-resource status history + correlated events |
//! | [`status`] | Pure, per-kind health status inference over a resource snapshot |
//! | [`cancel`] | Cooperative cancellation token shared across query worker threads |
//! | [`config`] | Store-wide tunables |
//! | [`error`] | Crate-level error type |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spectre_core::{Store, StoreConfig};
//! use spectre_core::model::{Event, EventType, ResourceMetadata};
//! use spectre_core::query::QueryRequest;
//! use spectre_core::timeline::TimelineRequest;
//!
//! let config = StoreConfig::new("/tmp/spectre-data");
//! let store = Store::open(config);
//!
//! store.append(Event {
//!     id: "evt-1".into(),
//!     timestamp: 1_735_726_500_000_000_000,
//!     event_type: EventType::Update,
//!     resource: ResourceMetadata {
//!         api_group: "apps".into(),
//!         api_version: "v1".into(),
//!         kind: "Pod".into(),
//!         namespace: "default".into(),
//!         name: "web-0".into(),
//!         uid: "u-1".into(),
//!     },
//!     data: br#"{"status":{"phase":"Running"}}"#.to_vec(),
//! }).unwrap();
//! store.flush().unwrap();
//!
//! let response = store.timeline(&TimelineRequest {
//!     start_ns: 0,
//!     end_ns: i64::MAX,
//!     ..Default::default()
//! }).unwrap();
//! assert_eq!(response.count, 1);
//!
//! let _ = QueryRequest::default();
//! ```

#![allow(dead_code)]

pub mod block;
pub mod buffer;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod encoding;
pub mod error;
pub mod model;
pub mod query;
pub mod segment;
pub mod status;
pub mod timeline;

use std::sync::Mutex;

pub use config::StoreConfig;
pub use error::SpectreError;
pub use model::Event;

use cancel::CancellationToken;
use catalog::IndexCache;
use query::{QueryRequest, QueryResult};
use segment::SegmentWriter;
use timeline::{TimelineRequest, TimelineResponse};

/// Facade wiring ingestion (buffer + segment writer) and reads (catalog +
/// query executor + timeline assembler) behind one handle.
///
/// A `Store` holds at most one open segment writer at a time, guarded by
/// a mutex — concurrent `append` calls serialize on it, matching §4.2's
/// single-active-writer-per-store model. Reads never take this lock;
/// they only ever see finalized, rename-committed files.
pub struct Store {
    config: StoreConfig,
    cache: IndexCache,
    active_writer: Mutex<Option<SegmentWriter>>,
}

impl Store {
    pub fn open(config: StoreConfig) -> Self {
        let cache = IndexCache::new(config.index_cache_capacity);
        Self {
            config,
            cache,
            active_writer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Appends one event to the store's active segment, rolling over to
    /// a new segment file when the event's partition key (hour bucket)
    /// differs from the active writer's.
    pub fn append(&self, event: Event) -> Result<(), SpectreError> {
        let mut guard = self
            .active_writer
            .lock()
            .map_err(|_| SpectreError::Internal("active writer mutex poisoned".into()))?;

        if let Some(writer) = guard.as_ref() {
            if writer.is_rollover(event.timestamp) {
                let finished = guard.take().unwrap();
                finished.finalize()?;
            }
        }

        if guard.is_none() {
            let writer = SegmentWriter::create(
                &self.config.data_dir,
                event.timestamp,
                self.config.block_size_target,
                self.config.compression,
                self.config.checksum_enabled,
            )?;
            *guard = Some(writer);
        }

        guard.as_mut().expect("writer just created above").append(event)?;
        Ok(())
    }

    /// Finalizes the active segment, if any, making its events visible
    /// to queries. Ingestion may continue afterward into a fresh segment.
    pub fn flush(&self) -> Result<(), SpectreError> {
        let mut guard = self
            .active_writer
            .lock()
            .map_err(|_| SpectreError::Internal("active writer mutex poisoned".into()))?;
        if let Some(writer) = guard.take() {
            writer.finalize()?;
        }
        Ok(())
    }

    /// Executes an ad-hoc filtered query over finalized segments.
    pub fn query(&self, request: &QueryRequest) -> Result<QueryResult, SpectreError> {
        let cancel = CancellationToken::new();
        query::execute(&self.config, &self.cache, request, &cancel)
    }

    /// Same as [`Store::query`] but with a caller-supplied cancellation
    /// token, for callers that want to cancel an in-flight query.
    pub fn query_cancellable(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<QueryResult, SpectreError> {
        query::execute(&self.config, &self.cache, request, cancel)
    }

    /// Assembles per-resource status timelines correlated with native
    /// Kubernetes events — the store's primary read path.
    pub fn timeline(&self, request: &TimelineRequest) -> Result<TimelineResponse, SpectreError> {
        let cancel = CancellationToken::new();
        timeline::assemble(&self.config, &self.cache, request, &cancel, None)
    }

    /// Returns the distinct namespaces, kinds, and overall timestamp
    /// range observed across finalized segments, optionally restricted
    /// to a time window. Scans index sections only — no block is ever
    /// decompressed to answer this.
    pub fn metadata(&self, window: Option<(i64, i64)>) -> Result<Metadata, SpectreError> {
        let all_files =
            catalog::discover_segment_files(&self.config.data_dir).map_err(SpectreError::WriteFailed)?;
        let files = match window {
            Some((start, end)) => catalog::files_overlapping(&all_files, start, end),
            None => all_files,
        };

        let mut namespaces = std::collections::BTreeSet::new();
        let mut kinds = std::collections::BTreeSet::new();
        let mut earliest: Option<i64> = None;
        let mut latest: Option<i64> = None;

        for file in &files {
            let Ok(bytes) = catalog::map_segment_file(&file.path) else {
                continue;
            };
            let Ok(section) = self.cache.get_or_parse(&file.path, &bytes) else {
                continue;
            };
            namespaces.extend(section.inverted_index.namespace_to_blocks.0.keys().cloned());
            kinds.extend(section.inverted_index.kind_to_blocks.0.keys().cloned());
            earliest = Some(match earliest {
                Some(e) => e.min(section.statistics.timestamp_min),
                None => section.statistics.timestamp_min,
            });
            latest = Some(match latest {
                Some(l) => l.max(section.statistics.timestamp_max),
                None => section.statistics.timestamp_max,
            });
        }

        Ok(Metadata {
            namespaces: namespaces.into_iter().collect(),
            kinds: kinds.into_iter().collect(),
            earliest: earliest.unwrap_or(0),
            latest: latest.unwrap_or(0),
        })
    }
}

/// Result of [`Store::metadata`].
#[derive(Debug, Default)]
pub struct Metadata {
    pub namespaces: Vec<String>,
    pub kinds: Vec<String>,
    pub earliest: i64,
    pub latest: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{EventType, ResourceMetadata};
    use tempfile::tempdir;

    fn event(uid: &str, kind: &str, ts: i64) -> Event {
        Event {
            id: format!("{uid}-{ts}"),
            timestamp: ts,
            event_type: EventType::Update,
            resource: ResourceMetadata {
                api_group: "apps".into(),
                api_version: "v1".into(),
                kind: kind.into(),
                namespace: "default".into(),
                name: "web-0".into(),
                uid: uid.into(),
            },
            data: br#"{"status":{"phase":"Running"}}"#.to_vec(),
        }
    }

    #[test]
    fn append_flush_query_round_trips() {
        let dir = tempdir().unwrap();
        let store = Store::open(StoreConfig::new(dir.path().to_path_buf()));
        let ts = 1_735_726_500_000_000_000i64;
        store.append(event("u1", "Pod", ts)).unwrap();
        store.flush().unwrap();

        let result = store
            .query(&QueryRequest {
                start_ns: ts - 1,
                end_ns: ts + 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(result.count, 1);
    }

    #[test]
    fn timeline_assembles_one_status_segment() {
        let dir = tempdir().unwrap();
        let store = Store::open(StoreConfig::new(dir.path().to_path_buf()));
        let ts = 1_735_726_500_000_000_000i64;
        store.append(event("u1", "Pod", ts)).unwrap();
        store.flush().unwrap();

        let response = store
            .timeline(&TimelineRequest {
                start_ns: ts - 1,
                end_ns: ts + 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.resources[0].status_segments.len(), 1);
    }

    #[test]
    fn metadata_reports_observed_kinds_and_namespaces() {
        let dir = tempdir().unwrap();
        let store = Store::open(StoreConfig::new(dir.path().to_path_buf()));
        let ts = 1_735_726_500_000_000_000i64;
        store.append(event("u1", "Pod", ts)).unwrap();
        store.append(event("u2", "Node", ts + 10)).unwrap();
        store.flush().unwrap();

        let metadata = store.metadata(None).unwrap();
        assert_eq!(metadata.kinds, vec!["Node".to_string(), "Pod".to_string()]);
        assert_eq!(metadata.namespaces, vec!["default".to_string()]);
    }
}
