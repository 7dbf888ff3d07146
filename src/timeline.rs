//! Timeline Assembler (C6): combines a resource query and a correlated
//! Kubernetes-Event query into per-resource status histories.
//!
//! The two sub-queries run concurrently via `crossbeam::thread::scope`,
//! mirroring the Query Executor's fan-out mechanism (§5: "two concurrent
//! sub-queries, joined before assembly").

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::cancel::CancellationToken;
use crate::catalog::IndexCache;
use crate::config::StoreConfig;
use crate::error::SpectreError;
use crate::model::{Event, K8sEvent, ResourceTimeline, StatusSegment};
use crate::query::{self, QueryRequest};
use crate::status;

/// A timeline request: a time window plus an optional kind/namespace
/// scope, per §6.2.
#[derive(Debug, Clone, Default)]
pub struct TimelineRequest {
    pub start_ns: i64,
    pub end_ns: i64,
    pub kinds: Vec<String>,
    pub namespaces: Vec<String>,
}

#[derive(Debug, Default)]
pub struct TimelineResponse {
    pub resources: Vec<ResourceTimeline>,
    pub count: usize,
    pub execution_time_ms: u64,
}

/// Path A seam: a graph-aware executor that has already resolved, per
/// resource UID, the native Kubernetes Events that reference it. Not
/// populated by this store today — `assemble` falls back to Path B
/// (scanning the Event-query results directly) whenever this is `None`.
pub type PrecomputedEventIndex = HashMap<String, Vec<K8sEvent>>;

/// Assembles timelines for every resource observed in `request`'s window
/// and scope.
///
/// Event-query failure is non-fatal: resources are still returned with
/// empty `events`. Resource-query failure is fatal and propagates.
pub fn assemble(
    config: &StoreConfig,
    cache: &IndexCache,
    request: &TimelineRequest,
    cancel: &CancellationToken,
    precomputed_events: Option<&PrecomputedEventIndex>,
) -> Result<TimelineResponse, SpectreError> {
    let started = std::time::Instant::now();

    let resource_request = QueryRequest {
        start_ns: request.start_ns,
        end_ns: request.end_ns,
        kinds: request.kinds.clone(),
        namespaces: request.namespaces.clone(),
        group: None,
        version: None,
    };
    let event_request = QueryRequest {
        start_ns: request.start_ns,
        end_ns: request.end_ns,
        kinds: vec!["Event".to_string()],
        namespaces: request.namespaces.clone(),
        group: None,
        version: Some("v1".to_string()),
    };

    let mut resource_result = None;
    let mut event_result = None;
    let scan = crossbeam::thread::scope(|scope| {
        let resource_handle = scope.spawn(|_| query::execute(config, cache, &resource_request, cancel));
        let event_handle = scope.spawn(|_| query::execute(config, cache, &event_request, cancel));
        resource_result = resource_handle.join().ok();
        event_result = event_handle.join().ok();
    });
    if scan.is_err() {
        return Err(SpectreError::Internal(
            "timeline assembly worker thread panicked".into(),
        ));
    }

    let resource_query = resource_result
        .ok_or_else(|| SpectreError::Internal("resource query thread did not return".into()))??;

    let k8s_events: Vec<Event> = match event_result {
        Some(Ok(result)) => result.events,
        Some(Err(e)) => {
            warn!(error = %e, "event correlation query failed, proceeding without events");
            Vec::new()
        }
        None => {
            warn!("event correlation query thread did not return, proceeding without events");
            Vec::new()
        }
    };

    let by_uid = group_by_resource(resource_query.events);

    // The last status segment for each resource runs to the end of the
    // queried window, not to its own start — it describes "what was true
    // from this event until the window closes" (§8 S1).
    let mut resources: Vec<ResourceTimeline> = by_uid
        .into_iter()
        .map(|(uid, events)| build_resource_timeline(uid, events, request.end_ns))
        .collect();

    attach_k8s_events(&mut resources, &k8s_events, precomputed_events);

    resources.sort_by(|a, b| a.id.cmp(&b.id));
    let count = resources.len();

    Ok(TimelineResponse {
        resources,
        count,
        execution_time_ms: started.elapsed().as_millis() as u64,
    })
}

/// Groups events by resource UID, dropping events without one — a
/// resource the store cannot key cannot be correlated across its
/// lifetime. Also drops `Event`-kind objects: those are the correlated
/// Kubernetes events attached via [`attach_k8s_events`], not primary
/// resources in their own right, and the resource sub-query only picks
/// them up because an empty `kinds` scope is a wildcard.
fn group_by_resource(events: Vec<Event>) -> HashMap<String, Vec<Event>> {
    let mut by_uid: HashMap<String, Vec<Event>> = HashMap::new();
    for event in events {
        if event.resource.uid.is_empty() || event.resource.kind == "Event" {
            continue;
        }
        by_uid.entry(event.resource.uid.clone()).or_default().push(event);
    }
    by_uid
}

fn build_resource_timeline(uid: String, mut events: Vec<Event>, window_end: i64) -> ResourceTimeline {
    events.sort_by_key(|e| e.timestamp);

    let first = events.first().expect("group_by_resource never inserts empty vecs");
    let group = first.resource.api_group.clone();
    let version = first.resource.api_version.clone();
    let kind = first.resource.kind.clone();
    let namespace = first.resource.namespace.clone();
    let name = first.resource.name.clone();

    let mut status_segments = Vec::with_capacity(events.len());
    for (i, event) in events.iter().enumerate() {
        let inference = status::infer(&event.resource.kind, &event.data, event.event_type);
        let end_time = events
            .get(i + 1)
            .map(|next| next.timestamp)
            .unwrap_or(window_end);
        status_segments.push(StatusSegment {
            start_time: event.timestamp,
            end_time,
            status: inference.status,
            message: inference.messages.join("; "),
            resource_data: event.data.clone(),
        });
    }

    ResourceTimeline {
        id: uid,
        group,
        version,
        kind,
        namespace,
        name,
        status_segments,
        events: Vec::new(),
    }
}

/// Attaches correlated Kubernetes events to each resource's timeline.
/// Prefers the precomputed index (Path A) when present; otherwise walks
/// the live Event-query results and parses `involvedObjectUID` out of
/// each event's `data` payload (Path B).
fn attach_k8s_events(
    resources: &mut [ResourceTimeline],
    k8s_events: &[Event],
    precomputed: Option<&PrecomputedEventIndex>,
) {
    if let Some(index) = precomputed {
        for resource in resources.iter_mut() {
            if let Some(events) = index.get(&resource.id) {
                resource.events = events.clone();
            }
        }
        return;
    }

    let mut by_uid: HashMap<String, Vec<K8sEvent>> = HashMap::new();
    for event in k8s_events {
        let Some(uid) = involved_object_uid(&event.data) else {
            continue;
        };
        by_uid.entry(uid).or_default().push(to_k8s_event(event));
    }

    for resource in resources.iter_mut() {
        if let Some(events) = by_uid.remove(&resource.id) {
            resource.events = events;
        }
    }
}

fn involved_object_uid(data: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(data).ok()?;
    value
        .get("involvedObjectUID")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn to_k8s_event(event: &Event) -> K8sEvent {
    let value: Option<Value> = serde_json::from_slice(&event.data).ok();
    let get_str = |path: &str| -> String {
        value
            .as_ref()
            .and_then(|v| v.get(path))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    };
    let get_int = |path: &str| -> i64 {
        value
            .as_ref()
            .and_then(|v| v.get(path))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    };

    K8sEvent {
        id: event.id.clone(),
        timestamp: event.timestamp,
        reason: get_str("reason"),
        message: get_str("message"),
        event_type: get_str("type"),
        count: get_int("count"),
        first_timestamp: get_int("firstTimestamp"),
        last_timestamp: get_int("lastTimestamp"),
        source: get_str("source"),
    }
}
