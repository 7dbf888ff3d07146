//! Cooperative cancellation (§5, §9 design note).
//!
//! A plain atomic flag threaded through every long-running operation —
//! deliberately not a global signal. Each request gets its own token;
//! cancelling one query never touches another's state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A request-scoped cancellation signal, checked at block and per-resource
/// assembly boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
