//! Progress reporting and cooperative cancellation.
//!
//! The engine is CPU-bound and never suspends; it reports a monotone
//! percentage at phase boundaries and during the magnifier loop, and
//! checks the cancel token at those same boundaries. The sink must be
//! fast — it runs inline on the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receiver for engine progress updates. Percent is monotone in [0, 100].
pub trait ProgressSink {
    fn report(&self, pct: u8, message: &str);
}

/// Sink that drops every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _pct: u8, _message: &str) {}
}

/// Shared cancellation flag, checked at progress boundaries.
///
/// Cloning shares the flag; cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
