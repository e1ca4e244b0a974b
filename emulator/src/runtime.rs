//! Worker-thread runtime for [`HpdDriver`].
//!
//! The worker thread exclusively owns the driver. Producers hold an
//! [`EventHandle`], which latches the event and queues a wake on a bounded(1)
//! channel; a full channel means a wake is already queued, so raising never
//! blocks. The worker sleeps until the next wake or the armed deadline,
//! whichever comes first.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use hpd_core::repl::status::StatusSnapshot;
use hpd_core::telemetry::{TELEMETRY_RING_CAPACITY, TelemetryRecord};
use hpd_core::timing::TimingError;
use hpd_core::{EventLatch, HpdDriver, HpdHooks, HpdOps, HpdState, HpdTiming, StepNote};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

const WORKER_THREAD_NAME: &str = "hpd-worker";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid controller timing: {0}")]
    Timing(#[from] TimingError),
    #[error("failed to spawn controller worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("controller worker panicked")]
    WorkerPanicked,
}

/// What the worker publishes for readers on other threads.
#[derive(Debug, Default)]
struct Published {
    history: VecDeque<TelemetryRecord>,
    next_deadline: Option<Duration>,
    edid_attempts: u8,
}

#[derive(Debug)]
struct Shared {
    latch: EventLatch,
    state: AtomicU8,
    published: Mutex<Published>,
    epoch: Instant,
}

impl Shared {
    fn uptime(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn publish<O: HpdOps>(&self, driver: &HpdDriver<O>) {
        self.state
            .store(driver.state().as_index(), Ordering::Release);
        let mut published = self.published.lock();
        published.next_deadline = driver.next_deadline();
        published.edid_attempts = driver.machine().edid_attempts();
    }

    fn record(&self, record: TelemetryRecord) {
        let mut published = self.published.lock();
        if published.history.len() == TELEMETRY_RING_CAPACITY {
            published.history.pop_front();
        }
        published.history.push_back(record);
    }
}

/// Fire-and-forget event producer. Cheap to clone and safe to use from any thread.
#[derive(Clone, Debug)]
pub struct EventHandle {
    shared: Arc<Shared>,
    wake: Sender<()>,
}

impl EventHandle {
    /// Latches hotplug activity and wakes the worker. Returns `false` once
    /// the controller has shut down.
    pub fn raise(&self) -> bool {
        if self.shared.latch.is_shutdown() {
            return false;
        }
        self.shared.latch.raise();
        match self.wake.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// Hotplug controller running on its own worker thread.
pub struct HostController<O: HpdOps + Send + 'static> {
    shared: Arc<Shared>,
    wake: Sender<()>,
    worker: Option<JoinHandle<HpdDriver<O>>>,
}

impl<O: HpdOps + Send + 'static> HostController<O> {
    /// Runs the init hook on the calling thread, then starts the worker.
    pub fn spawn(ops: O, hooks: HpdHooks<O>, timing: HpdTiming) -> Result<Self, RuntimeError> {
        timing.validate()?;

        let driver = HpdDriver::new(ops, hooks, timing);
        let shared = Arc::new(Shared {
            latch: EventLatch::new(),
            state: AtomicU8::new(driver.state().as_index()),
            published: Mutex::new(Published::default()),
            epoch: Instant::now(),
        });
        let (wake, wakeups) = channel::bounded(1);

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || run_worker(driver, &worker_shared, &wakeups))
            .map_err(RuntimeError::Spawn)?;

        info!(?timing, "hotplug controller started");
        Ok(Self {
            shared,
            wake,
            worker: Some(worker),
        })
    }

    pub fn raise_handle(&self) -> EventHandle {
        EventHandle {
            shared: Arc::clone(&self.shared),
            wake: self.wake.clone(),
        }
    }

    /// Shorthand for `raise_handle().raise()`.
    pub fn raise(&self) -> bool {
        self.raise_handle().raise()
    }

    pub fn state(&self) -> HpdState {
        HpdState::from_index(self.shared.state.load(Ordering::Acquire))
            .unwrap_or(HpdState::InitFromBootloader)
    }

    /// Recent evaluations, oldest first.
    pub fn history(&self) -> Vec<TelemetryRecord> {
        self.shared.published.lock().history.iter().copied().collect()
    }

    /// Time since the controller started.
    pub fn uptime(&self) -> Duration {
        self.shared.uptime()
    }

    pub fn status(&self) -> StatusSnapshot {
        let now = self.shared.uptime();
        let published = self.shared.published.lock();
        let since_transition = published
            .history
            .iter()
            .rev()
            .find(|record| record.step.changed_state())
            .map(|record| now.saturating_sub(record.timestamp));

        StatusSnapshot {
            state: self.state(),
            level: published.history.back().map(|record| record.step.level),
            edid_attempts: published.edid_attempts,
            since_transition,
            next_evaluation: published
                .next_deadline
                .map(|deadline| deadline.saturating_sub(now)),
            sink: None,
        }
    }

    /// Stops the worker, waits for any in-flight evaluation, then runs the
    /// release hook. Returns `Ok(false)` if already shut down.
    pub fn shutdown(&mut self) -> Result<bool, RuntimeError> {
        let Some(worker) = self.worker.take() else {
            return Ok(false);
        };

        self.shared.latch.request_shutdown();
        // A full channel already holds a wake for the worker.
        let _ = self.wake.try_send(());

        let mut driver = worker.join().map_err(|_| RuntimeError::WorkerPanicked)?;
        driver.shutdown(&self.shared.latch);
        self.shared.publish(&driver);
        info!(state = %driver.state(), "hotplug controller stopped");
        Ok(true)
    }
}

impl<O: HpdOps + Send + 'static> Drop for HostController<O> {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            warn!(%error, "hotplug controller shutdown failed");
        }
    }
}

fn run_worker<O: HpdOps>(
    mut driver: HpdDriver<O>,
    shared: &Shared,
    wakeups: &Receiver<()>,
) -> HpdDriver<O> {
    loop {
        if shared.latch.is_shutdown() {
            break;
        }

        let woken = match driver
            .next_deadline()
            .and_then(|deadline| shared.epoch.checked_add(deadline))
        {
            Some(deadline) => match wakeups.recv_deadline(deadline) {
                Ok(()) => true,
                Err(RecvTimeoutError::Timeout) => false,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match wakeups.recv() {
                Ok(()) => true,
                Err(_) => break,
            },
        };

        if shared.latch.is_shutdown() {
            break;
        }

        let mut now = shared.uptime();
        if woken && driver.on_event(now, &shared.latch) {
            debug!(at_ms = now.as_millis(), "hotplug event latched");
        }

        while driver
            .poll_with_clock(now, &shared.latch, || shared.uptime())
            .is_some()
        {
            if let Some(record) = driver.telemetry().latest().copied() {
                log_record(&record);
                shared.record(record);
            }
            now = shared.uptime();
        }
        shared.publish(&driver);
    }

    debug!("hotplug worker exiting");
    driver
}

fn log_record(record: &TelemetryRecord) {
    match record.step.note {
        Some(StepNote::NoHandler) => {
            warn!(id = record.id, state = %record.step.from, "evaluation scheduled in a state with no handler");
        }
        Some(
            StepNote::EdidReadFailed { .. }
            | StepNote::EdidAttemptsExhausted { .. }
            | StepNote::RecheckFailed { .. }
            | StepNote::RecheckAttemptsExhausted { .. },
        ) => warn!(id = record.id, "{record}"),
        _ => info!(id = record.id, "{record}"),
    }
}
