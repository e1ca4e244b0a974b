//! Executor-agnostic driver that owns one hotplug controller.
//!
//! A runtime (an embassy task on the MCU, a worker thread on the host) owns
//! the [`HpdDriver`] exclusively and feeds it two things: wakeups caused by
//! [`EventLatch::raise`], and the passage of time. Because a single owner runs
//! every evaluation, state mutation is serialized without a lock and no two
//! evaluations can ever overlap.
//!
//! The runtime loop is always the same:
//!
//! 1. wait until either the latch is raised or [`HpdDriver::next_deadline`]
//!    passes;
//! 2. call [`HpdDriver::on_event`] if it was woken by a raise;
//! 3. call [`HpdDriver::poll_with_clock`] and log the returned [`Step`].

use core::time::Duration;

use crate::latch::EventLatch;
use crate::machine::{HpdMachine, Reschedule, Step};
use crate::ops::{HpdHooks, HpdOps};
use crate::scheduler::DelaySlot;
use crate::state::HpdState;
use crate::telemetry::{TELEMETRY_RING_CAPACITY, TelemetryRecorder};
use crate::timing::HpdTiming;

/// Hotplug controller: state machine, delay slot, and transition history.
pub struct HpdDriver<O: HpdOps, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    machine: HpdMachine<O>,
    hooks: HpdHooks<O>,
    slot: DelaySlot,
    telemetry: TelemetryRecorder<CAPACITY>,
    shutdown: bool,
}

impl<O: HpdOps, const CAPACITY: usize> HpdDriver<O, CAPACITY> {
    /// Runs the optional init hook and returns a driver in
    /// [`HpdState::InitFromBootloader`] with no timer armed.
    pub fn new(mut ops: O, hooks: HpdHooks<O>, timing: HpdTiming) -> Self {
        hooks.run_init(&mut ops);
        Self {
            machine: HpdMachine::new(ops, timing),
            hooks,
            slot: DelaySlot::new(),
            telemetry: TelemetryRecorder::new(),
            shutdown: false,
        }
    }

    pub const fn state(&self) -> HpdState {
        self.machine.state()
    }

    pub const fn machine(&self) -> &HpdMachine<O> {
        &self.machine
    }

    /// Mutable access to the capability provider between evaluations.
    pub fn ops_mut(&mut self) -> &mut O {
        self.machine.ops_mut()
    }

    pub const fn telemetry(&self) -> &TelemetryRecorder<CAPACITY> {
        &self.telemetry
    }

    pub const fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Uptime at which the next evaluation is due, if one is armed.
    pub const fn next_deadline(&self) -> Option<Duration> {
        self.slot.deadline()
    }

    /// Arms an immediate evaluation when an event is latched, replacing
    /// whatever timer was pending. Returns `true` if it armed the slot.
    pub fn on_event(&mut self, now: Duration, latch: &EventLatch) -> bool {
        if self.shutdown || latch.is_shutdown() || !latch.is_pending() {
            return false;
        }
        self.slot.arm(now, Reschedule::IMMEDIATE);
        true
    }

    /// Runs one evaluation if the slot is due, treating the evaluation as
    /// instantaneous.
    pub fn poll(&mut self, now: Duration, latch: &EventLatch) -> Option<Step> {
        self.poll_with_clock(now, latch, || now)
    }

    /// Runs one evaluation if the slot is due.
    ///
    /// `clock` is sampled after the provider calls return, and the committed
    /// delay is measured from that instant, so a slow EDID read or disable
    /// never shortens the debounce or retry spacing that follows it.
    pub fn poll_with_clock<C>(&mut self, now: Duration, latch: &EventLatch, clock: C) -> Option<Step>
    where
        C: FnOnce() -> Duration,
    {
        if self.shutdown || latch.is_shutdown() {
            self.slot.cancel();
            return None;
        }
        if !self.slot.take_due(now) {
            return None;
        }

        let pending = latch.take_pending();
        let step = self.machine.evaluate(pending);
        if step.is_committed() {
            let committed_at = clock().max(now);
            self.commit(committed_at, step.reschedule, latch);
        }
        self.telemetry.record_step(step, now);
        Some(step)
    }

    fn commit(&mut self, now: Duration, reschedule: Reschedule, latch: &EventLatch) {
        if latch.is_shutdown() {
            self.slot.cancel();
        } else if latch.is_pending() {
            // An event arrived mid-evaluation; its immediate wakeup wins over
            // the committed delay, including a steady state's `Idle`.
            self.slot.arm(now, Reschedule::IMMEDIATE);
        } else {
            self.slot.arm(now, reschedule);
        }
    }

    /// Stops the controller: cancels the timer and runs the release hook.
    ///
    /// The caller must have drained the runtime so no evaluation is running.
    /// Returns `false` if the driver was already shut down.
    pub fn shutdown(&mut self, latch: &EventLatch) -> bool {
        latch.request_shutdown();
        if self.shutdown {
            return false;
        }
        self.shutdown = true;
        self.slot.cancel();
        self.hooks.run_release(self.machine.ops_mut());
        true
    }

    /// Consumes a shut-down driver and returns the capability provider.
    pub fn into_ops(self) -> O {
        self.machine.into_ops()
    }
}
