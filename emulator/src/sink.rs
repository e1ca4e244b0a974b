//! Simulated display sink.
//!
//! The REPL thread changes the plug level and scripts EDID answers while the
//! controller worker calls into the same model through [`HpdOps`]. Clones
//! share one model.

use std::sync::Arc;

use hpd_core::repl::status::SinkCounters;
use hpd_core::{HpdLevel, HpdOps, RecheckOutcome};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct SinkModel {
    plugged: bool,
    /// Reads and rechecks that fail before the sink answers again.
    failures_remaining: u32,
    /// Identity presented by the sink; bumped by `swap_identity`.
    identity: u32,
    /// Identity captured by the last successful read.
    acquired_identity: Option<u32>,
    output_enabled: bool,
    counters: SinkCounters,
}

/// Shared panel model implementing the controller capabilities.
#[derive(Clone, Debug, Default)]
pub struct SimulatedSink {
    model: Arc<Mutex<SinkModel>>,
}

impl SimulatedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink whose HPD line starts asserted.
    pub fn plugged() -> Self {
        let sink = Self::new();
        sink.set_plugged(true);
        sink
    }

    pub fn set_plugged(&self, plugged: bool) {
        self.model.lock().plugged = plugged;
    }

    pub fn is_plugged(&self) -> bool {
        self.model.lock().plugged
    }

    /// Fails the next `count` reads or rechecks.
    pub fn fail_next(&self, count: u32) {
        self.model.lock().failures_remaining = count;
    }

    pub fn clear_failures(&self) {
        self.model.lock().failures_remaining = 0;
    }

    /// Presents a new identity; returns its number.
    pub fn swap_identity(&self) -> u32 {
        let mut model = self.model.lock();
        model.identity = model.identity.wrapping_add(1);
        model.identity
    }

    /// Whether the controller has the output enabled.
    pub fn output_enabled(&self) -> bool {
        self.model.lock().output_enabled
    }

    pub fn counters(&self) -> SinkCounters {
        self.model.lock().counters
    }
}

impl SinkModel {
    fn consume_failure(&mut self) -> bool {
        if self.failures_remaining == 0 {
            return false;
        }
        self.failures_remaining -= 1;
        true
    }
}

impl HpdOps for SimulatedSink {
    fn hpd_level(&mut self) -> HpdLevel {
        HpdLevel::from_asserted(self.model.lock().plugged)
    }

    fn disable(&mut self) {
        let mut model = self.model.lock();
        model.counters.disables += 1;
        model.output_enabled = false;
    }

    fn edid_read(&mut self) -> bool {
        let mut model = self.model.lock();
        model.counters.edid_reads += 1;
        if !model.plugged || model.consume_failure() {
            return false;
        }
        model.acquired_identity = Some(model.identity);
        true
    }

    fn edid_ready(&mut self) {
        let mut model = self.model.lock();
        model.counters.edid_ready += 1;
        model.output_enabled = true;
    }

    fn edid_recheck(&mut self) -> RecheckOutcome {
        let mut model = self.model.lock();
        model.counters.edid_rechecks += 1;
        if !model.plugged || model.consume_failure() {
            RecheckOutcome::Failed
        } else if model.acquired_identity == Some(model.identity) {
            RecheckOutcome::Unchanged
        } else {
            RecheckOutcome::Changed
        }
    }
}
