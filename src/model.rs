//! Core data model: the unit of ingestion ([`Event`]) and the identity tuple
//! ([`ResourceMetadata`]) that ties every event to the Kubernetes object it
//! describes.
//!
//! Everything here is plain data. Encoding to/from the on-disk wire format
//! lives in `encoding_impls.rs`; interpreting an event's opaque `data` payload
//! for health status lives in [`crate::status`].


mod encoding_impls;

/// The three kinds of mutation an [`Event`] can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// Identity tuple for a Kubernetes resource: `{apiGroup, apiVersion, kind,
/// namespace, name, uid}`. `uid` is the unique identifier; the rest is a
/// human-readable label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ResourceMetadata {
    pub api_group: String,
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

/// The unit of ingestion and storage.
///
/// `data` is an opaque byte string — the serialized resource snapshot at this
/// event. It may be empty for `DELETE`. The store never validates its
/// internal structure beyond what [`crate::status`] needs for health
/// inference.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: String,
    /// Nanoseconds since epoch. Monotonic-per-resource is expected, not
    /// required.
    pub timestamp: i64,
    pub event_type: EventType,
    pub resource: ResourceMetadata,
    pub data: Vec<u8>,
}

impl Event {
    /// Redundant accounting field named in the data model: length of `data`.
    pub fn data_size(&self) -> usize {
        self.data.len()
    }
}

/// The native Kubernetes `Event` object (e.g. *BackOff*, *FailedScheduling*),
/// distinct from an ingestion [`Event`] (a change record). Derived from the
/// `data` payload of an ingested Event whose `resource.kind == "Event"`.
#[derive(Debug, Clone)]
pub struct K8sEvent {
    pub id: String,
    pub timestamp: i64,
    pub reason: String,
    pub message: String,
    pub event_type: String,
    pub count: i64,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub source: String,
}

/// Inferred health status of a resource at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ready,
    Warning,
    Error,
    Terminating,
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Terminating => "Terminating",
            Self::Unknown => "Unknown",
        }
    }
}

/// A derived interval `[start_time, end_time)` carrying a single inferred
/// health status for one resource, bounded by consecutive ingestion events.
#[derive(Debug, Clone)]
pub struct StatusSegment {
    pub start_time: i64,
    pub end_time: i64,
    pub status: Status,
    /// Human-readable errors joined together; empty when status is healthy.
    pub message: String,
    /// Raw snapshot this segment was derived from.
    pub resource_data: Vec<u8>,
}

/// One resource's assembled timeline: its status history plus correlated
/// Kubernetes events.
#[derive(Debug, Clone)]
pub struct ResourceTimeline {
    pub id: String,
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub status_segments: Vec<StatusSegment>,
    pub events: Vec<K8sEvent>,
}
