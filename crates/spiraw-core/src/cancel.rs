//! Cooperative cancellation
//!
//! The unbounded clocking loop is the only place that can run forever. It
//! polls a [`CancelToken`] before every write; whoever holds a clone of the
//! token (a signal handler, a test, another thread) can request a stop.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    ///
    /// Only performs an atomic store, so it may be called from a signal
    /// handler.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
