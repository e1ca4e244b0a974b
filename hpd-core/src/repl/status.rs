//! Shared status surface for the REPL.
//!
//! Front-ends fill a [`StatusSnapshot`] from what their runtime publishes
//! (and, on the host, from the simulated sink) and render it with [`StatusFormatter`], so the
//! `status` command reads the same everywhere.

use core::fmt;
use core::time::Duration;

use crate::state::{HpdLevel, HpdState};

/// Capability call counters reported by a simulated or instrumented sink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SinkCounters {
    pub disables: u32,
    pub edid_reads: u32,
    pub edid_ready: u32,
    pub edid_rechecks: u32,
}

/// Snapshot of reusable status information surfaced by the REPL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: HpdState,
    /// Level sampled by the most recent evaluation.
    pub level: Option<HpdLevel>,
    pub edid_attempts: u8,
    /// Time since the last committed state change.
    pub since_transition: Option<Duration>,
    /// Time until the next scheduled evaluation.
    pub next_evaluation: Option<Duration>,
    pub sink: Option<SinkCounters>,
}

impl StatusSnapshot {
    /// Builds a snapshot for a controller that has not evaluated yet.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            state: HpdState::InitFromBootloader,
            level: None,
            edid_attempts: 0,
            since_transition: None,
            next_evaluation: None,
            sink: None,
        }
    }

    #[must_use]
    pub const fn with_sink(mut self, counters: SinkCounters) -> Self {
        self.sink = Some(counters);
        self
    }
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    /// Creates a new formatter for the provided snapshot.
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the controller line (e.g. `hpd state=enabled level=asserted edid-attempts=1`).
    pub fn write_state_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "hpd state={} level=", self.snapshot.state)?;
        match self.snapshot.level {
            Some(level) => write!(writer, "{level}")?,
            None => writer.write_str("unknown")?,
        }
        write!(writer, " edid-attempts={}", self.snapshot.edid_attempts)
    }

    /// Writes the timing line (e.g. `timer since=+1.5s next=idle`).
    pub fn write_timer_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("timer since=")?;
        write_duration(writer, self.snapshot.since_transition)?;
        writer.write_str(" next=")?;
        match self.snapshot.next_evaluation {
            Some(remaining) => write_duration(writer, Some(remaining)),
            None => writer.write_str("idle"),
        }
    }

    /// Writes the sink line (e.g. `sink disables=2 reads=3 ready=1 rechecks=0`).
    pub fn write_sink_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        match self.snapshot.sink {
            Some(counters) => write!(
                writer,
                "sink disables={} reads={} ready={} rechecks={}",
                counters.disables, counters.edid_reads, counters.edid_ready, counters.edid_rechecks
            ),
            None => writer.write_str("sink n/a"),
        }
    }
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Option<Duration>) -> fmt::Result {
    match duration {
        None => writer.write_str("n/a"),
        Some(value) if value >= Duration::from_secs(1) => {
            let millis = value.as_millis();
            let seconds = millis / 1_000;
            let tenths = (millis % 1_000) / 100;
            write!(writer, "+{seconds}.{tenths}s")
        }
        Some(value) => write!(writer, "+{}ms", value.as_millis()),
    }
}
