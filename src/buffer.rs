//! Event Buffer (C2): accumulates events in memory until a block-size
//! threshold is reached, then hands them to the Segment Writer to seal.
//!
//! Single-writer by construction — the type carries no internal
//! synchronization; it is driven exclusively by its owning writer thread.

use std::collections::BTreeSet;

use crate::model::{Event, EventType};

/// Default uncompressed block size target (§4.2): 256 KiB.
pub const DEFAULT_BLOCK_SIZE_TARGET: usize = 256 * 1024;
/// Smallest admissible block size target: 32 KiB.
pub const MIN_BLOCK_SIZE_TARGET: usize = 32 * 1024;
/// Largest admissible block size target: 1 MiB.
pub const MAX_BLOCK_SIZE_TARGET: usize = 1024 * 1024;

/// Clamps a requested block size target into the admissible range.
pub fn clamp_block_size_target(requested: usize) -> usize {
    requested.clamp(MIN_BLOCK_SIZE_TARGET, MAX_BLOCK_SIZE_TARGET)
}

/// Estimates the serialized size of `event` without actually encoding it,
/// used to decide whether adding it would cross the block size target.
fn estimated_size(event: &Event) -> usize {
    event.id.len()
        + 8 // timestamp
        + 1 // event type tag
        + event.resource.api_group.len()
        + event.resource.api_version.len()
        + event.resource.kind.len()
        + event.resource.namespace.len()
        + event.resource.name.len()
        + event.resource.uid.len()
        + event.data.len()
        + 32 // length-prefix / framing overhead, approximated
}

/// An in-memory, single-writer accumulation of events awaiting a block
/// seal. Tracks the running timestamp range and the three identity sets
/// so the Segment Writer can build `BlockMetadata` without a second pass.
#[derive(Debug, Default)]
pub struct EventBuffer {
    target_size: usize,
    events: Vec<Event>,
    estimated_bytes: usize,
    min_timestamp: Option<i64>,
    max_timestamp: Option<i64>,
    kinds: BTreeSet<String>,
    namespaces: BTreeSet<String>,
    groups: BTreeSet<String>,
}

impl EventBuffer {
    pub fn new(target_size: usize) -> Self {
        Self {
            target_size: clamp_block_size_target(target_size),
            ..Self::default()
        }
    }

    pub fn with_default_target() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE_TARGET)
    }

    /// Attempts to add `event` to the buffer. Returns `false` if adding it
    /// would exceed the target size and the buffer is already non-empty —
    /// in that case the event was **not** added, and the caller must seal
    /// the buffer and retry against a fresh one.
    ///
    /// A single event larger than the target is still admitted into an
    /// empty buffer, since sealing an empty buffer would make no progress.
    pub fn try_add_event(&mut self, event: Event) -> Result<(), Event> {
        let size = estimated_size(&event);
        if !self.events.is_empty() && self.estimated_bytes + size > self.target_size {
            return Err(event);
        }

        self.estimated_bytes += size;
        self.min_timestamp = Some(match self.min_timestamp {
            Some(min) => min.min(event.timestamp),
            None => event.timestamp,
        });
        self.max_timestamp = Some(match self.max_timestamp {
            Some(max) => max.max(event.timestamp),
            None => event.timestamp,
        });

        // A DELETE event carries empty data but its identity still
        // extends the tracked sets (§4.2).
        self.kinds.insert(event.resource.kind.clone());
        self.namespaces.insert(event.resource.namespace.clone());
        self.groups.insert(event.resource.api_group.clone());

        self.events.push(event);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn min_timestamp(&self) -> Option<i64> {
        self.min_timestamp
    }

    pub fn max_timestamp(&self) -> Option<i64> {
        self.max_timestamp
    }

    pub fn kinds(&self) -> &BTreeSet<String> {
        &self.kinds
    }

    pub fn namespaces(&self) -> &BTreeSet<String> {
        &self.namespaces
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    /// Seals the buffer, returning its accumulated events and clearing
    /// internal state back to a fresh, empty buffer with the same target.
    pub fn seal(&mut self) -> Vec<Event> {
        self.estimated_bytes = 0;
        self.min_timestamp = None;
        self.max_timestamp = None;
        self.kinds.clear();
        self.namespaces.clear();
        self.groups.clear();
        std::mem::take(&mut self.events)
    }
}
