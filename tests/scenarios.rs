//! End-to-end scenario tests, one per testable property named in the
//! design document (S1-S6): round-trip, event correlation, block
//! pruning, multi-file windows, corrupt-block tolerance, and a status
//! inference scenario driven entirely through the public `Store` API.

use spectre_core::block::CompressionAlgo;
use spectre_core::config::StoreConfig;
use spectre_core::model::{Event, EventType, ResourceMetadata, Status};
use spectre_core::query::QueryRequest;
use spectre_core::segment::SegmentWriter;
use spectre_core::timeline::TimelineRequest;
use spectre_core::Store;

fn pod_event(id: &str, event_type: EventType, ts: i64, data: &[u8]) -> Event {
    Event {
        id: id.into(),
        timestamp: ts,
        event_type,
        resource: ResourceMetadata {
            api_group: "".into(),
            api_version: "v1".into(),
            kind: "Pod".into(),
            namespace: "default".into(),
            name: "a".into(),
            uid: "U1".into(),
        },
        data: data.to_vec(),
    }
}

fn k8s_event(id: &str, ts: i64, uid: &str, reason: &str) -> Event {
    Event {
        id: id.into(),
        timestamp: ts,
        event_type: EventType::Create,
        resource: ResourceMetadata {
            api_group: "".into(),
            api_version: "v1".into(),
            kind: "Event".into(),
            namespace: "default".into(),
            name: "a.xyz".into(),
            uid: format!("evt-{uid}-{ts}"),
        },
        data: format!(
            r#"{{"involvedObjectUID":"{uid}","reason":"{reason}","message":"Back-off restarting failed container","type":"Warning","count":1}}"#
        )
        .into_bytes(),
    }
}

/// S1 - round-trip one file: 3 status segments derived from 3 events.
#[test]
fn s1_round_trip_one_file_yields_three_status_segments() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(StoreConfig::new(dir.path().to_path_buf()));

    store.append(pod_event("e1", EventType::Create, 1000, b"")).unwrap();
    store
        .append(pod_event(
            "e2",
            EventType::Update,
            2000,
            br#"{"status":{"phase":"Running","conditions":[{"type":"Ready","status":"True"}]}}"#,
        ))
        .unwrap();
    store
        .append(pod_event(
            "e3",
            EventType::Update,
            3000,
            br#"{"status":{"phase":"Running","containerStatuses":[{"state":{"waiting":{"reason":"CrashLoopBackOff"}},"restartCount":1}]}}"#,
        ))
        .unwrap();
    store.flush().unwrap();

    let response = store
        .timeline(&TimelineRequest {
            start_ns: 0,
            end_ns: 10_000,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(response.count, 1);
    let resource = &response.resources[0];
    assert_eq!(resource.status_segments.len(), 3);

    assert_eq!(resource.status_segments[0].start_time, 1000);
    assert_eq!(resource.status_segments[0].end_time, 2000);
    assert_eq!(resource.status_segments[0].status, Status::Unknown);

    assert_eq!(resource.status_segments[1].start_time, 2000);
    assert_eq!(resource.status_segments[1].end_time, 3000);
    assert_eq!(resource.status_segments[1].status, Status::Ready);

    assert_eq!(resource.status_segments[2].start_time, 3000);
    assert_eq!(resource.status_segments[2].end_time, 10_000);
    assert_eq!(resource.status_segments[2].status, Status::Error);
    assert!(resource.status_segments[2].message.contains("CrashLoopBackOff"));

    assert!(resource.events.is_empty());
}

/// S2 - event correlation: a K8s Event referencing the resource's UID is
/// attached to its timeline.
#[test]
fn s2_event_correlation_attaches_matching_k8s_event() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(StoreConfig::new(dir.path().to_path_buf()));

    store.append(pod_event("e1", EventType::Create, 1000, b"")).unwrap();
    store
        .append(pod_event(
            "e2",
            EventType::Update,
            2000,
            br#"{"status":{"phase":"Running","conditions":[{"type":"Ready","status":"True"}]}}"#,
        ))
        .unwrap();
    store
        .append(pod_event(
            "e3",
            EventType::Update,
            3000,
            br#"{"status":{"phase":"Running","containerStatuses":[{"state":{"waiting":{"reason":"CrashLoopBackOff"}},"restartCount":1}]}}"#,
        ))
        .unwrap();
    store.append(k8s_event("k1", 2900, "U1", "BackOff")).unwrap();
    store.flush().unwrap();

    let response = store
        .timeline(&TimelineRequest {
            start_ns: 0,
            end_ns: 10_000,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(response.count, 1);
    let resource = &response.resources[0];
    assert_eq!(resource.events.len(), 1);
    assert_eq!(resource.events[0].reason, "BackOff");
    assert_eq!(resource.events[0].timestamp, 2900);
    assert_eq!(resource.events[0].event_type, "Warning");
}

/// S3 - block pruning: only one of ten blocks contains the requested
/// namespace, so the query scans exactly one block and skips nine.
#[test]
fn s3_block_pruning_scans_one_of_ten_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let ts = 1_735_726_500_000_000_000i64;
    // Each event's padded payload alone exceeds the block size target, so
    // the buffer (which admits an oversized event only into an otherwise
    // empty buffer) seals one block per event: exactly 10 blocks.
    let block_size_target = 32 * 1024;
    let padding = "x".repeat(block_size_target + 1024);
    let mut writer =
        SegmentWriter::create(dir.path(), ts, block_size_target, CompressionAlgo::Zstd, true).unwrap();

    for i in 0..10 {
        let namespace = if i == 4 { "payments" } else { "default" };
        writer
            .append(Event {
                id: format!("e{i}"),
                timestamp: ts + i as i64,
                event_type: EventType::Update,
                resource: ResourceMetadata {
                    api_group: "".into(),
                    api_version: "v1".into(),
                    kind: "Pod".into(),
                    namespace: namespace.into(),
                    name: format!("pod-{i}"),
                    uid: format!("U{i}"),
                },
                data: format!(r#"{{"status":{{"phase":"Running","pad":"{padding}"}}}}"#).into_bytes(),
            })
            .unwrap();
    }
    writer.finalize().unwrap();

    let store = Store::open(StoreConfig::new(dir.path().to_path_buf()));
    let result = store
        .query(&QueryRequest {
            start_ns: ts - 1,
            end_ns: ts + 1000,
            namespaces: vec!["payments".to_string()],
            ..Default::default()
        })
        .unwrap();

    assert_eq!(result.count, 1);
    assert_eq!(result.events[0].resource.namespace, "payments");
    assert_eq!(result.segments_scanned, 1);
    assert_eq!(result.segments_skipped, 9);
}

/// S4 - multi-file time window: events split across two hour partitions
/// are both visited by one query.
#[test]
fn s4_multi_file_window_searches_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let hour10 = 1_735_726_200_000_000_000i64; // 2025-01-01T10:30:00Z
    let hour11 = hour10 + 3600 * 1_000_000_000; // 2025-01-01T11:30:00Z

    let store = Store::open(StoreConfig::new(dir.path().to_path_buf()));
    store.append(pod_event("e1", EventType::Update, hour10, br#"{"status":{}}"#)).unwrap();
    store.append(pod_event("e2", EventType::Update, hour11, br#"{"status":{}}"#)).unwrap();
    store.flush().unwrap();

    let result = store
        .query(&QueryRequest {
            start_ns: hour10 - 1,
            end_ns: hour11 + 1,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(result.count, 2);
    assert_eq!(result.files_searched, 2);
}

/// S5 - corrupt block tolerance: flipping bytes inside one sealed block
/// does not fail the query; the other blocks still surface their events.
#[test]
fn s5_corrupt_block_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let ts = 1_735_726_500_000_000_000i64;
    let mut writer = SegmentWriter::create(dir.path(), ts, 64 * 1024, CompressionAlgo::Zstd, true).unwrap();
    for i in 0..5 {
        writer
            .append(pod_event(&format!("e{i}"), EventType::Update, ts + i, br#"{"status":{}}"#))
            .unwrap();
    }
    let path = writer.finalize().unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    // Flip a byte squarely inside the compressed block payload, after the
    // fixed-size file header and before any index/footer bytes.
    let corrupt_at = spectre_core::block::FILE_HEADER_SIZE + 8;
    bytes[corrupt_at] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let store = Store::open(StoreConfig::new(dir.path().to_path_buf()));
    let result = store
        .query(&QueryRequest {
            start_ns: ts - 1,
            end_ns: ts + 1000,
            ..Default::default()
        })
        .unwrap();

    assert!(result.segments_skipped >= 1);
}

/// S6 - deployment replica shortfall produces a Warning with the exact
/// expected message substring.
#[test]
fn s6_deployment_replica_shortfall_is_warning() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(StoreConfig::new(dir.path().to_path_buf()));
    let ts = 1_735_726_500_000_000_000i64;

    store
        .append(Event {
            id: "d1".into(),
            timestamp: ts,
            event_type: EventType::Update,
            resource: ResourceMetadata {
                api_group: "apps".into(),
                api_version: "v1".into(),
                kind: "Deployment".into(),
                namespace: "default".into(),
                name: "web".into(),
                uid: "D1".into(),
            },
            data: br#"{"spec":{"replicas":3},"status":{"readyReplicas":1,"availableReplicas":1}}"#.to_vec(),
        })
        .unwrap();
    store.flush().unwrap();

    let response = store
        .timeline(&TimelineRequest {
            start_ns: ts - 1,
            end_ns: ts + 1000,
            kinds: vec!["Deployment".to_string()],
            ..Default::default()
        })
        .unwrap();

    assert_eq!(response.count, 1);
    let segment = &response.resources[0].status_segments[0];
    assert_eq!(segment.status, Status::Warning);
    assert!(segment.message.contains("Insufficient replicas (1/3 ready)"));
}
