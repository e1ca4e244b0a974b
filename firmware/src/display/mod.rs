//! Hotplug controller surface bridging firmware tasks with `hpd-core`.
//!
//! [`HpdEvents`] is shared between the HPD edge task and the controller task:
//! raising an event latches it and signals the controller, which never blocks
//! the producer. [`HpdRunner`] owns the driver and sleeps until either that
//! signal fires or the armed deadline passes.

pub mod sink;

use embassy_futures::select::{Either, select};
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use hpd_core::telemetry::TelemetryRecord;
use hpd_core::{EventLatch, HpdDriver, HpdHooks, HpdOps, HpdState, HpdTiming, StepNote};

#[cfg(target_os = "none")]
type HpdMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type HpdMutex = NoopRawMutex;

/// Event latch plus the signals used to wake and stop the controller task.
pub struct HpdEvents {
    latch: EventLatch,
    wake: Signal<HpdMutex, ()>,
    stopped: Signal<HpdMutex, ()>,
}

impl HpdEvents {
    pub const fn new() -> Self {
        Self {
            latch: EventLatch::new(),
            wake: Signal::new(),
            stopped: Signal::new(),
        }
    }

    /// Latches hotplug activity. Safe to call from any task at any time.
    pub fn raise(&self) {
        if self.latch.is_shutdown() {
            return;
        }
        self.latch.raise();
        self.wake.signal(());
    }

    /// Asks the controller task to stop and waits until the release hook ran.
    pub async fn shutdown(&self) {
        if self.latch.request_shutdown() {
            self.wake.signal(());
        }
        self.stopped.wait().await;
        // Let later callers return immediately too.
        self.stopped.signal(());
    }

    pub fn is_shutdown(&self) -> bool {
        self.latch.is_shutdown()
    }
}

impl Default for HpdEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Async loop that owns one [`HpdDriver`].
pub struct HpdRunner<'a, O: HpdOps> {
    driver: HpdDriver<O>,
    events: &'a HpdEvents,
    epoch: Instant,
}

impl<'a, O: HpdOps> HpdRunner<'a, O> {
    /// Runs the init hook and anchors the controller clock at `epoch`.
    pub fn new(
        ops: O,
        hooks: HpdHooks<O>,
        timing: HpdTiming,
        events: &'a HpdEvents,
        epoch: Instant,
    ) -> Self {
        Self {
            driver: HpdDriver::new(ops, hooks, timing),
            events,
            epoch,
        }
    }

    pub fn state(&self) -> HpdState {
        self.driver.state()
    }

    /// Processes events and timers until shutdown, then releases the ops.
    pub async fn run(mut self) -> O {
        let events = self.events;
        let latch = &events.latch;
        loop {
            if latch.is_shutdown() {
                break;
            }

            let woken = match self.driver.next_deadline() {
                Some(deadline) => {
                    let at = self.epoch + core_duration_to_embassy(deadline);
                    matches!(
                        select(events.wake.wait(), Timer::at(at)).await,
                        Either::First(())
                    )
                }
                None => {
                    events.wake.wait().await;
                    true
                }
            };

            if latch.is_shutdown() {
                break;
            }

            let epoch = self.epoch;
            let mut now = uptime(epoch, Instant::now());
            if woken {
                self.driver.on_event(now, latch);
            }
            while self
                .driver
                .poll_with_clock(now, latch, || uptime(epoch, Instant::now()))
                .is_some()
            {
                if let Some(record) = self.driver.telemetry().latest() {
                    log_record(record);
                }
                now = uptime(epoch, Instant::now());
            }
        }

        self.driver.shutdown(latch);
        log_stopped(self.driver.state());
        events.stopped.signal(());
        self.driver.into_ops()
    }
}

/// Controller uptime at `now`, measured from `epoch`.
pub fn uptime(epoch: Instant, now: Instant) -> core::time::Duration {
    let elapsed = now.checked_duration_since(epoch).unwrap_or(Duration::from_ticks(0));
    core::time::Duration::from_micros(elapsed.as_micros())
}

pub fn core_duration_to_embassy(duration: core::time::Duration) -> Duration {
    let micros = duration.as_micros();
    let micros = u64::try_from(micros).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

fn is_warning(note: Option<StepNote>) -> bool {
    matches!(
        note,
        Some(
            StepNote::NoHandler
                | StepNote::EdidReadFailed { .. }
                | StepNote::EdidAttemptsExhausted { .. }
                | StepNote::RecheckFailed { .. }
                | StepNote::RecheckAttemptsExhausted { .. }
        )
    )
}

#[cfg(target_os = "none")]
fn log_record(record: &TelemetryRecord) {
    if is_warning(record.step.note) {
        defmt::warn!("hpd: {}", defmt::Display2Format(record));
    } else {
        defmt::info!("hpd: {}", defmt::Display2Format(record));
    }
}

#[cfg(not(target_os = "none"))]
fn log_record(record: &TelemetryRecord) {
    let level = if is_warning(record.step.note) {
        "warn"
    } else {
        "info"
    };
    println!("hpd[{level}]: {record}");
}

#[cfg(target_os = "none")]
fn log_stopped(state: HpdState) {
    defmt::info!("hpd: controller stopped in {}", state.label());
}

#[cfg(not(target_os = "none"))]
fn log_stopped(state: HpdState) {
    println!("hpd: controller stopped in {state}");
}
