//! Simulated clock and scripted sink shared by the integration tests.

#![allow(dead_code)]

use core::time::Duration;

use hpd_core::telemetry::TelemetryRecord;
use hpd_core::{
    EventLatch, HpdDriver, HpdHooks, HpdLevel, HpdOps, HpdState, HpdTiming, RecheckOutcome, Step,
};

/// Panel model driven by the tests.
#[derive(Debug, Default)]
pub struct ScriptedSink {
    pub plugged: bool,
    /// Reads and rechecks that fail before the sink answers again.
    pub failures: u32,
    /// Identity changes not yet observed by a recheck.
    pub swapped: bool,
    pub disables: u32,
    pub reads: u32,
    pub ready: u32,
    pub rechecks: u32,
    pub inits: u32,
    pub releases: u32,
}

impl ScriptedSink {
    fn consume_failure(&mut self) -> bool {
        if self.failures > 0 {
            self.failures -= 1;
            true
        } else {
            false
        }
    }
}

impl HpdOps for ScriptedSink {
    fn hpd_level(&mut self) -> HpdLevel {
        HpdLevel::from_asserted(self.plugged)
    }

    fn disable(&mut self) {
        self.disables += 1;
    }

    fn edid_read(&mut self) -> bool {
        self.reads += 1;
        if self.consume_failure() {
            return false;
        }
        self.swapped = false;
        true
    }

    fn edid_ready(&mut self) {
        self.ready += 1;
    }

    fn edid_recheck(&mut self) -> RecheckOutcome {
        self.rechecks += 1;
        if self.consume_failure() {
            RecheckOutcome::Failed
        } else if core::mem::take(&mut self.swapped) {
            RecheckOutcome::Changed
        } else {
            RecheckOutcome::Unchanged
        }
    }
}

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Single-threaded runtime: events are delivered immediately and timers fire
/// exactly at their deadlines.
pub struct Harness {
    pub driver: HpdDriver<ScriptedSink>,
    pub latch: EventLatch,
    pub now: Duration,
    pub steps: Vec<Step>,
}

impl Harness {
    pub fn new(sink: ScriptedSink) -> Self {
        Self::with_timing(sink, HpdTiming::new())
    }

    pub fn with_timing(sink: ScriptedSink, timing: HpdTiming) -> Self {
        let hooks = HpdHooks::none()
            .with_init(|sink: &mut ScriptedSink| sink.inits += 1)
            .with_release(|sink: &mut ScriptedSink| sink.releases += 1);
        Self {
            driver: HpdDriver::new(sink, hooks, timing),
            latch: EventLatch::new(),
            now: Duration::ZERO,
            steps: Vec::new(),
        }
    }

    pub fn sink(&self) -> &ScriptedSink {
        self.driver.machine().ops()
    }

    pub fn state(&self) -> HpdState {
        self.driver.state()
    }

    /// Raises an event and runs the evaluation it schedules.
    pub fn raise(&mut self) {
        self.latch.raise();
        self.driver.on_event(self.now, &self.latch);
        self.run_due();
    }

    /// Changes the sampled level and raises an event.
    pub fn set_plugged(&mut self, plugged: bool) {
        self.driver.ops_mut().plugged = plugged;
        self.raise();
    }

    /// Fires every timer due up to `now + delta`, in order.
    pub fn advance(&mut self, delta: Duration) {
        let target = self.now + delta;
        while let Some(deadline) = self.driver.next_deadline() {
            if deadline > target {
                break;
            }
            self.now = self.now.max(deadline);
            self.run_due();
        }
        self.now = target;
    }

    /// Advances far enough for every pending timer chain to settle.
    pub fn settle(&mut self) {
        self.advance(ms(10_000));
    }

    fn run_due(&mut self) {
        while let Some(step) = self.driver.poll(self.now, &self.latch) {
            self.steps.push(step);
        }
    }

    pub fn history(&self) -> Vec<TelemetryRecord> {
        self.driver.telemetry().oldest_first().copied().collect()
    }

    /// States entered in order, starting from the first evaluation.
    pub fn path(&self) -> Vec<HpdState> {
        self.steps.iter().filter_map(|step| step.to).collect()
    }
}
