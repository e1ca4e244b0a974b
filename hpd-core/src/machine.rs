//! Hotplug state engine and event arbitration.
//!
//! [`HpdMachine::evaluate`] is the single evaluation entry point. It samples
//! the HPD line and then either applies the event-driven transition table
//! (when a hotplug interrupt was raised since the previous evaluation) or the
//! current state's own handler. Handlers call out to [`HpdOps`] and return
//! the next state plus the delay before the following evaluation; the caller
//! commits that delay to its single-slot timer.
//!
//! An externally raised event always preempts the state's scheduled work, so
//! asynchronous hardware activity is absorbed exclusively by
//! [`HpdMachine::handle_event`].

use core::time::Duration;

use crate::ops::HpdOps;
use crate::state::{HpdLevel, HpdState, RecheckOutcome};
use crate::timing::HpdTiming;

/// When the next evaluation should run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Reschedule {
    /// Leave the timer disarmed; only a hotplug event wakes the machine.
    Idle,
    /// Evaluate again once the delay elapses.
    After(Duration),
}

impl Reschedule {
    /// Evaluate again as soon as possible.
    pub const IMMEDIATE: Reschedule = Reschedule::After(Duration::ZERO);

    /// Returns the requested delay, if any.
    #[must_use]
    pub const fn delay(self) -> Option<Duration> {
        match self {
            Reschedule::Idle => None,
            Reschedule::After(delay) => Some(delay),
        }
    }
}

/// Why an evaluation ran.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StepCause {
    /// A hotplug event was pending; the event table decided the outcome.
    Event,
    /// The timer fired with no pending event; the state handler ran.
    Timer,
}

/// Noteworthy detail attached to an evaluation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StepNote {
    /// HPD bounced while enabled and came back before the event was handled.
    BounceIgnored,
    /// The state has no timer-driven handler; nothing was committed.
    NoHandler,
    /// Leaving the bootloader state without disabling the output.
    BootloaderHandoff,
    /// HPD dropped while waiting to read the EDID.
    ReadAborted,
    /// An EDID read failed; another attempt is scheduled.
    EdidReadFailed { attempt: u8 },
    /// Every EDID read attempt failed; the output is disabled.
    EdidAttemptsExhausted { attempts: u8 },
    /// The EDID was read on the given attempt.
    EdidAcquired { attempt: u8 },
    /// HPD did not come back within the drop timeout.
    ReassertTimedOut,
    /// An EDID recheck failed; another attempt is scheduled.
    RecheckFailed { attempt: u8 },
    /// Every recheck attempt failed; the machine restarts from reset.
    RecheckAttemptsExhausted { attempts: u8 },
    /// The sink identity survived the HPD drop.
    RecheckUnchanged,
    /// A different sink is connected; the machine restarts from reset.
    RecheckChanged,
}

/// Record of one evaluation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Step {
    pub cause: StepCause,
    /// HPD level sampled at the start of the evaluation.
    pub level: HpdLevel,
    pub from: HpdState,
    /// State committed by the evaluation, `None` when nothing was committed.
    pub to: Option<HpdState>,
    /// Requested timer action. Only meaningful when `to` is set.
    pub reschedule: Reschedule,
    pub note: Option<StepNote>,
}

impl Step {
    /// Returns `true` when the evaluation committed a state.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.to.is_some()
    }

    /// Returns `true` when the committed state differs from the prior one.
    #[must_use]
    pub fn changed_state(&self) -> bool {
        matches!(self.to, Some(to) if to != self.from)
    }
}

/// Outcome of a single handler before it is folded into a [`Step`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Decision {
    next: Option<HpdState>,
    reschedule: Reschedule,
    note: Option<StepNote>,
}

impl Decision {
    const fn go(next: HpdState, reschedule: Reschedule) -> Self {
        Self {
            next: Some(next),
            reschedule,
            note: None,
        }
    }

    const fn hold(note: StepNote) -> Self {
        Self {
            next: None,
            reschedule: Reschedule::Idle,
            note: Some(note),
        }
    }

    const fn noted(mut self, note: StepNote) -> Self {
        self.note = Some(note);
        self
    }
}

/// Hotplug lifecycle state machine bound to one capability provider.
pub struct HpdMachine<O> {
    ops: O,
    timing: HpdTiming,
    state: HpdState,
    edid_attempts: u8,
}

impl<O: HpdOps> HpdMachine<O> {
    /// Creates a machine in [`HpdState::InitFromBootloader`].
    pub const fn new(ops: O, timing: HpdTiming) -> Self {
        Self {
            ops,
            timing,
            state: HpdState::InitFromBootloader,
            edid_attempts: 0,
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> HpdState {
        self.state
    }

    /// Failed attempts in the current EDID read or recheck sequence.
    pub const fn edid_attempts(&self) -> u8 {
        self.edid_attempts
    }

    pub const fn timing(&self) -> &HpdTiming {
        &self.timing
    }

    pub const fn ops(&self) -> &O {
        &self.ops
    }

    pub fn ops_mut(&mut self) -> &mut O {
        &mut self.ops
    }

    /// Consumes the machine and returns the capability provider.
    pub fn into_ops(self) -> O {
        self.ops
    }

    /// Runs one evaluation. `pending_event` is the value just read (and
    /// cleared) from the event latch.
    pub fn evaluate(&mut self, pending_event: bool) -> Step {
        let level = self.ops.hpd_level();
        let from = self.state;

        let (cause, decision) = if pending_event {
            (StepCause::Event, self.handle_event(level))
        } else {
            (StepCause::Timer, self.dispatch(level))
        };

        if let Some(next) = decision.next {
            self.state = next;
        }

        Step {
            cause,
            level,
            from,
            to: decision.next,
            reschedule: decision.reschedule,
            note: decision.note,
        }
    }

    /// Event-driven transition table.
    fn handle_event(&mut self, level: HpdLevel) -> Decision {
        match (self.state, level) {
            // Hold steady and see if the sink comes back.
            (HpdState::DoneEnabled, HpdLevel::Deasserted) => Decision::go(
                HpdState::WaitForReassert,
                Reschedule::After(self.timing.drop_timeout),
            ),
            // HPD came back; reset only if the EDID changed.
            (HpdState::WaitForReassert, HpdLevel::Asserted) => {
                self.edid_attempts = 0;
                Decision::go(
                    HpdState::RecheckEdid,
                    Reschedule::After(self.timing.check_edid_delay),
                )
            }
            (HpdState::DoneEnabled, HpdLevel::Asserted) => Decision::hold(StepNote::BounceIgnored),
            // Same protocol as Reset without disabling bootloader output.
            (HpdState::InitFromBootloader, HpdLevel::Asserted) => Decision::go(
                HpdState::CheckPlug,
                Reschedule::After(self.timing.stabilize),
            )
            .noted(StepNote::BootloaderHandoff),
            _ => Decision::go(HpdState::Reset, Reschedule::After(self.timing.stabilize)),
        }
    }

    /// Timer-driven per-state handlers.
    fn dispatch(&mut self, level: HpdLevel) -> Decision {
        match self.state {
            HpdState::Reset => self.reset(),
            HpdState::CheckPlug => self.check_plug(level),
            HpdState::CheckEdid => self.check_edid(level),
            HpdState::WaitForReassert => {
                Decision::go(HpdState::Reset, Reschedule::IMMEDIATE).noted(StepNote::ReassertTimedOut)
            }
            HpdState::RecheckEdid => self.recheck_edid(),
            HpdState::DoneDisabled | HpdState::DoneEnabled | HpdState::InitFromBootloader => {
                Decision::hold(StepNote::NoHandler)
            }
        }
    }

    fn reset(&mut self) -> Decision {
        self.ops.disable();
        Decision::go(
            HpdState::CheckPlug,
            Reschedule::After(self.timing.check_plug_delay),
        )
    }

    fn check_plug(&mut self, level: HpdLevel) -> Decision {
        if level.is_asserted() {
            self.edid_attempts = 0;
            Decision::go(
                HpdState::CheckEdid,
                Reschedule::After(self.timing.check_edid_delay),
            )
        } else {
            self.ops.disable();
            Decision::go(HpdState::DoneDisabled, Reschedule::Idle)
        }
    }

    fn check_edid(&mut self, level: HpdLevel) -> Decision {
        if !level.is_asserted() {
            self.ops.disable();
            return Decision::go(HpdState::DoneDisabled, Reschedule::Idle)
                .noted(StepNote::ReadAborted);
        }

        if self.ops.edid_read() {
            let attempt = self.edid_attempts.saturating_add(1);
            self.ops.edid_ready();
            return Decision::go(HpdState::DoneEnabled, Reschedule::Idle)
                .noted(StepNote::EdidAcquired { attempt });
        }

        self.edid_attempts = self.edid_attempts.saturating_add(1);
        if self.edid_attempts >= self.timing.max_edid_attempts {
            self.ops.disable();
            Decision::go(HpdState::DoneDisabled, Reschedule::Idle).noted(
                StepNote::EdidAttemptsExhausted {
                    attempts: self.edid_attempts,
                },
            )
        } else {
            Decision::go(
                HpdState::CheckEdid,
                Reschedule::After(self.timing.check_edid_delay),
            )
            .noted(StepNote::EdidReadFailed {
                attempt: self.edid_attempts,
            })
        }
    }

    fn recheck_edid(&mut self) -> Decision {
        match self.ops.edid_recheck() {
            RecheckOutcome::Unchanged => {
                Decision::go(HpdState::DoneEnabled, Reschedule::Idle).noted(StepNote::RecheckUnchanged)
            }
            RecheckOutcome::Changed => {
                Decision::go(HpdState::Reset, Reschedule::IMMEDIATE).noted(StepNote::RecheckChanged)
            }
            RecheckOutcome::Failed => {
                self.edid_attempts = self.edid_attempts.saturating_add(1);
                if self.edid_attempts >= self.timing.max_edid_attempts {
                    Decision::go(HpdState::Reset, Reschedule::IMMEDIATE).noted(
                        StepNote::RecheckAttemptsExhausted {
                            attempts: self.edid_attempts,
                        },
                    )
                } else {
                    Decision::go(
                        HpdState::RecheckEdid,
                        Reschedule::After(self.timing.check_edid_delay),
                    )
                    .noted(StepNote::RecheckFailed {
                        attempt: self.edid_attempts,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct ScriptedOps {
        level: bool,
        read_ok: bool,
        recheck: Option<RecheckOutcome>,
        disables: u32,
        reads: u32,
        ready: u32,
        rechecks: u32,
    }

    impl HpdOps for ScriptedOps {
        fn hpd_level(&mut self) -> HpdLevel {
            HpdLevel::from_asserted(self.level)
        }

        fn disable(&mut self) {
            self.disables += 1;
        }

        fn edid_read(&mut self) -> bool {
            self.reads += 1;
            self.read_ok
        }

        fn edid_ready(&mut self) {
            self.ready += 1;
        }

        fn edid_recheck(&mut self) -> RecheckOutcome {
            self.rechecks += 1;
            self.recheck.unwrap_or(RecheckOutcome::Failed)
        }
    }

    fn machine(level: bool) -> HpdMachine<ScriptedOps> {
        HpdMachine::new(
            ScriptedOps {
                level,
                read_ok: true,
                ..ScriptedOps::default()
            },
            HpdTiming::new(),
        )
    }

    #[test]
    fn starts_in_bootloader_state() {
        let machine = machine(false);
        assert_eq!(machine.state(), HpdState::InitFromBootloader);
        assert_eq!(machine.edid_attempts(), 0);
    }

    #[test]
    fn bootloader_handoff_skips_disable() {
        let mut machine = machine(true);
        let step = machine.evaluate(true);

        assert_eq!(step.cause, StepCause::Event);
        assert_eq!(step.to, Some(HpdState::CheckPlug));
        assert_eq!(
            step.reschedule,
            Reschedule::After(Duration::from_millis(40))
        );
        assert_eq!(step.note, Some(StepNote::BootloaderHandoff));
        assert_eq!(machine.ops().disables, 0);
    }

    #[test]
    fn bootloader_without_hpd_falls_back_to_reset() {
        let mut machine = machine(false);
        let step = machine.evaluate(true);

        assert_eq!(step.to, Some(HpdState::Reset));
        assert_eq!(
            step.reschedule,
            Reschedule::After(Duration::from_millis(40))
        );
    }

    #[test]
    fn states_without_handlers_commit_nothing() {
        let mut machine = machine(true);
        let step = machine.evaluate(false);

        assert_eq!(step.to, None);
        assert_eq!(step.note, Some(StepNote::NoHandler));
        assert_eq!(machine.state(), HpdState::InitFromBootloader);
    }

    #[test]
    fn reset_disables_then_checks_plug() {
        let mut machine = machine(false);
        machine.evaluate(true);
        let step = machine.evaluate(false);

        assert_eq!(step.from, HpdState::Reset);
        assert_eq!(step.to, Some(HpdState::CheckPlug));
        assert_eq!(
            step.reschedule,
            Reschedule::After(Duration::from_millis(10))
        );
        assert_eq!(machine.ops().disables, 1);
    }

    #[test]
    fn recheck_changed_restarts_immediately() {
        let mut machine = machine(true);
        machine.evaluate(true); // -> CheckPlug
        machine.evaluate(false); // -> CheckEdid
        machine.evaluate(false); // -> DoneEnabled
        machine.ops_mut().level = false;
        machine.evaluate(true); // -> WaitForReassert
        machine.ops_mut().level = true;
        machine.ops_mut().recheck = Some(RecheckOutcome::Changed);
        machine.evaluate(true); // -> RecheckEdid

        let step = machine.evaluate(false);
        assert_eq!(step.to, Some(HpdState::Reset));
        assert_eq!(step.reschedule, Reschedule::IMMEDIATE);
        assert_eq!(step.note, Some(StepNote::RecheckChanged));
        assert_eq!(machine.ops().ready, 1);
    }

    #[test]
    fn bounce_while_enabled_is_ignored() {
        let mut machine = machine(true);
        machine.evaluate(true);
        machine.evaluate(false);
        machine.evaluate(false);
        assert_eq!(machine.state(), HpdState::DoneEnabled);

        let step = machine.evaluate(true);
        assert_eq!(step.to, None);
        assert_eq!(step.note, Some(StepNote::BounceIgnored));
        assert_eq!(machine.state(), HpdState::DoneEnabled);
        assert_eq!(machine.ops().disables, 0);
    }
}
