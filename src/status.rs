//! Status inferencer (part of C6): a pure, deterministic function of
//! `(kind, data, eventType)` that classifies a resource snapshot's health.
//!
//! Per the design note in §9, opaque snapshots are interpreted through a
//! small typed accessor façade ([`SnapshotView`]) instead of generic
//! runtime reflection; status inference is then a dispatch table from
//! kind to a pure predicate function over that façade.

use serde_json::Value;

use crate::model::{EventType, Status};

/// Typed accessor over an opaque JSON resource snapshot. Every accessor
/// is a pure, panic-free lookup; missing or mistyped fields return `None`
/// rather than erroring, since the store never validates `data`'s shape.
pub struct SnapshotView {
    root: Option<Value>,
}

impl SnapshotView {
    /// Parses `data` as JSON. Malformed payloads still produce a usable
    /// (empty) view — callers should fall back to `Unknown` status in
    /// that case, not error out.
    pub fn parse(data: &[u8]) -> Self {
        let root = if data.is_empty() {
            None
        } else {
            serde_json::from_slice(data).ok()
        };
        Self { root }
    }

    pub fn is_parseable(&self) -> bool {
        self.root.is_some()
    }

    fn navigate(&self, path: &[&str]) -> Option<&Value> {
        let mut cur = self.root.as_ref()?;
        for segment in path {
            cur = cur.get(segment)?;
        }
        Some(cur)
    }

    pub fn get_string(&self, path: &[&str]) -> Option<String> {
        self.navigate(path)?.as_str().map(str::to_string)
    }

    pub fn get_int(&self, path: &[&str]) -> Option<i64> {
        self.navigate(path)?.as_i64()
    }

    pub fn get_bool(&self, path: &[&str]) -> Option<bool> {
        self.navigate(path)?.as_bool()
    }

    pub fn get_array<'a>(&'a self, path: &[&str]) -> Vec<&'a Value> {
        self.navigate(path)
            .and_then(Value::as_array)
            .map(|arr| arr.iter().collect())
            .unwrap_or_default()
    }

    /// Returns `.status.conditions[]`, the common Kubernetes condition
    /// list shape shared by most resource kinds.
    pub fn conditions(&self) -> Vec<&Value> {
        self.get_array(&["status", "conditions"])
    }
}

/// Looks up a condition by `type` within a conditions array and returns
/// its `status` field (`"True"`/`"False"`/`"Unknown"`), if present.
fn condition_status<'a>(conditions: &[&'a Value], condition_type: &str) -> Option<&'a str> {
    conditions
        .iter()
        .find(|c| c.get("type").and_then(Value::as_str) == Some(condition_type))
        .and_then(|c| c.get("status"))
        .and_then(Value::as_str)
}

/// Restart-count threshold above which a Pod is flagged Warning even
/// without a known bad waiting reason (§4.6).
const POD_RESTART_WARNING_THRESHOLD: i64 = 5;

const POD_ERROR_WAITING_REASONS: &[&str] =
    &["CrashLoopBackOff", "ImagePullBackOff", "ErrImagePull", "OOMKilled"];

/// Outcome of the status inferencer: a health tag plus any human-readable
/// error/warning messages that justify it.
#[derive(Debug, Clone)]
pub struct Inference {
    pub status: Status,
    pub messages: Vec<String>,
}

impl Inference {
    fn ready() -> Self {
        Self {
            status: Status::Ready,
            messages: Vec::new(),
        }
    }

    fn unknown() -> Self {
        Self {
            status: Status::Unknown,
            messages: Vec::new(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            status: Status::Warning,
            messages: vec![message.into()],
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            messages: vec![message.into()],
        }
    }
}

/// Infers health status for a resource snapshot. Pure and deterministic:
/// calling twice on the same inputs yields byte-identical output (§8).
pub fn infer(kind: &str, data: &[u8], event_type: EventType) -> Inference {
    if event_type == EventType::Delete {
        return Inference {
            status: Status::Terminating,
            messages: Vec::new(),
        };
    }

    let view = SnapshotView::parse(data);
    if !view.is_parseable() {
        return Inference::unknown();
    }

    match kind {
        "Pod" => infer_pod(&view),
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" => infer_replicated(&view),
        "Node" => infer_node(&view),
        "Job" => infer_job(&view),
        "PersistentVolumeClaim" => infer_pvc(&view),
        _ => infer_generic(&view),
    }
}

fn infer_pod(view: &SnapshotView) -> Inference {
    let conditions = view.conditions();
    let phase = view.get_string(&["status", "phase"]);

    let container_statuses = view.get_array(&["status", "containerStatuses"]);
    for cs in &container_statuses {
        if let Some(waiting) = cs.get("state").and_then(|s| s.get("waiting")) {
            if let Some(reason) = waiting.get("reason").and_then(Value::as_str) {
                if POD_ERROR_WAITING_REASONS.contains(&reason) {
                    return Inference::error(format!("container waiting: {reason}"));
                }
            }
        }
        if let Some(restart_count) = cs.get("restartCount").and_then(Value::as_i64) {
            if restart_count >= POD_RESTART_WARNING_THRESHOLD {
                return Inference::warning(format!(
                    "container restart count {restart_count} exceeds threshold"
                ));
            }
        }
    }

    if phase.as_deref() == Some("Pending")
        && condition_status(&conditions, "PodScheduled") == Some("False")
    {
        return Inference::error("pod scheduling failed");
    }

    if phase.as_deref() == Some("Running") && condition_status(&conditions, "Ready") == Some("False")
    {
        return Inference::warning("pod running but not ready");
    }

    Inference::ready()
}

fn infer_replicated(view: &SnapshotView) -> Inference {
    let desired = view.get_int(&["spec", "replicas"]).unwrap_or(0);
    let ready = view
        .get_int(&["status", "readyReplicas"])
        .or_else(|| view.get_int(&["status", "numberReady"]))
        .unwrap_or(0);

    let conditions = view.conditions();
    if condition_status(&conditions, "Available") == Some("False") && desired > 0 {
        return Inference::error("Available condition is False");
    }
    if condition_status(&conditions, "Progressing") == Some("False") && desired > 0 {
        return Inference::warning("Progressing condition is False");
    }

    if desired > 0 && ready == 0 {
        return Inference::error(format!("Insufficient replicas (0/{desired} ready)"));
    }
    if ready < desired {
        return Inference::warning(format!("Insufficient replicas ({ready}/{desired} ready)"));
    }

    Inference::ready()
}

fn infer_node(view: &SnapshotView) -> Inference {
    let conditions = view.conditions();

    if condition_status(&conditions, "Ready") == Some("False") {
        return Inference::error("node Ready condition is False");
    }
    if condition_status(&conditions, "NetworkUnavailable") == Some("True") {
        return Inference::error("node network unavailable");
    }
    for (condition_type, label) in [
        ("MemoryPressure", "memory pressure"),
        ("DiskPressure", "disk pressure"),
        ("PIDPressure", "PID pressure"),
    ] {
        if condition_status(&conditions, condition_type) == Some("True") {
            return Inference::warning(format!("node under {label}"));
        }
    }

    Inference::ready()
}

fn infer_job(view: &SnapshotView) -> Inference {
    let conditions = view.conditions();
    if condition_status(&conditions, "Failed") == Some("True") {
        return Inference::error("job Failed condition is True");
    }
    let failed = view.get_int(&["status", "failed"]).unwrap_or(0);
    if failed > 0 {
        return Inference::warning(format!("{failed} failed pod(s)"));
    }
    Inference::ready()
}

fn infer_pvc(view: &SnapshotView) -> Inference {
    match view.get_string(&["status", "phase"]).as_deref() {
        Some("Pending") => Inference::warning("PVC phase is Pending"),
        Some("Lost") => Inference::error("PVC phase is Lost"),
        _ => Inference::ready(),
    }
}

fn infer_generic(view: &SnapshotView) -> Inference {
    let conditions = view.conditions();
    for condition_type in ["Failed", "Failing", "Stalled", "Degraded"] {
        if condition_status(&conditions, condition_type) == Some("True") {
            return Inference::error(format!("{condition_type} condition is True"));
        }
    }
    for condition_type in ["Ready", "Healthy"] {
        if condition_status(&conditions, condition_type) == Some("False") {
            return Inference::warning(format!("{condition_type} condition is False"));
        }
    }
    Inference::ready()
}
