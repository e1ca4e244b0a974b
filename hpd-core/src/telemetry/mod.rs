//! Transition history shared by firmware and host targets.
//!
//! Every evaluation produces a [`Step`]; the driver stores it in a fixed-size
//! ring together with its timestamp and the time elapsed since the previous
//! state change, so status displays can replay recent hotplug activity without
//! allocating.

use core::fmt;
use core::time::Duration;

use heapless::{HistoryBuf, OldestOrdered};

use crate::machine::{Reschedule, Step, StepCause, StepNote};
use crate::state::HpdState;

/// Identifier assigned to each recorded evaluation.
pub type EventId = u32;

/// Total number of evaluations retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Evaluation record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub id: EventId,
    /// Uptime at which the evaluation ran.
    pub timestamp: Duration,
    pub step: Step,
    /// Time since the previous committed state change, if any.
    pub elapsed_since_previous: Option<Duration>,
}

impl TelemetryRecord {
    /// Returns `true` when the record moved the machine into `state`.
    #[must_use]
    pub fn entered(&self, state: HpdState) -> bool {
        self.step.changed_state() && self.step.to == Some(state)
    }
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} t={}ms ", self.id, self.timestamp.as_millis())?;
        f.write_str(match self.step.cause {
            StepCause::Event => "event",
            StepCause::Timer => "timer",
        })?;
        write!(f, " hpd={} {}", self.step.level, self.step.from)?;
        match self.step.to {
            Some(to) => {
                write!(f, " -> {to}")?;
                match self.step.reschedule {
                    Reschedule::Idle => f.write_str(" (idle)")?,
                    Reschedule::After(delay) => write!(f, " (+{}ms)", delay.as_millis())?,
                }
            }
            None => f.write_str(" (held)")?,
        }
        if let Some(note) = self.step.note {
            write!(f, " [{}]", NoteLabel(note))?;
        }
        Ok(())
    }
}

/// Display adapter for [`StepNote`].
#[derive(Copy, Clone, Debug)]
pub struct NoteLabel(pub StepNote);

impl fmt::Display for NoteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            StepNote::BounceIgnored => f.write_str("ignoring bouncing hpd"),
            StepNote::NoHandler => f.write_str("no handler for state"),
            StepNote::BootloaderHandoff => f.write_str("taking over from bootloader"),
            StepNote::ReadAborted => f.write_str("hpd dropped, EDID read aborted"),
            StepNote::EdidReadFailed { attempt } => write!(f, "EDID read {attempt} failed"),
            StepNote::EdidAttemptsExhausted { attempts } => {
                write!(f, "EDID read failed {attempts} times, giving up")
            }
            StepNote::EdidAcquired { attempt } => write!(f, "EDID read on attempt {attempt}"),
            StepNote::ReassertTimedOut => f.write_str("hpd did not come back"),
            StepNote::RecheckFailed { attempt } => write!(f, "EDID recheck {attempt} failed"),
            StepNote::RecheckAttemptsExhausted { attempts } => {
                write!(f, "EDID recheck failed {attempts} times, resetting")
            }
            StepNote::RecheckUnchanged => f.write_str("no EDID change, taking no action"),
            StepNote::RecheckChanged => f.write_str("EDID changed, resetting"),
        }
    }
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord, CAPACITY>;

/// Records evaluations into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: TelemetryRing<CAPACITY>,
    last_transition_at: Option<Duration>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_transition_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded evaluations in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Total number of evaluations recorded, including evicted ones.
    pub const fn total_recorded(&self) -> EventId {
        self.next_event_id
    }

    /// Records an evaluation, measuring the time since the previous state change.
    pub fn record_step(&mut self, step: Step, timestamp: Duration) -> EventId {
        let elapsed = if step.changed_state() {
            let elapsed = self
                .last_transition_at
                .map(|previous| timestamp.saturating_sub(previous));
            self.last_transition_at = Some(timestamp);
            elapsed
        } else {
            None
        };

        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            step,
            elapsed_since_previous: elapsed,
        });

        id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
