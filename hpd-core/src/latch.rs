//! Lock-free flags shared between interrupt-context producers and the worker.
//!
//! Raising an event only flips an atomic, so it is safe from an interrupt
//! handler or any thread and never blocks. The worker clears the pending flag
//! at the start of each evaluation; an event raised after that point stays
//! latched for the next evaluation.

use portable_atomic::{AtomicBool, Ordering};

/// Pending-event and shutdown flags for one controller.
#[derive(Debug, Default)]
pub struct EventLatch {
    pending: AtomicBool,
    shutdown: AtomicBool,
}

impl EventLatch {
    /// Creates a latch with no pending event.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Records hotplug activity. Returns `true` when no event was pending yet.
    pub fn raise(&self) -> bool {
        !self.pending.swap(true, Ordering::AcqRel)
    }

    /// Reads and clears the pending flag.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Returns `true` while an event is waiting for an evaluation.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Marks the controller as shutting down. Returns `true` on the first call.
    pub fn request_shutdown(&self) -> bool {
        !self.shutdown.swap(true, Ordering::AcqRel)
    }

    /// Returns `true` once shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}
