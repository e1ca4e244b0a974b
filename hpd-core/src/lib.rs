#![no_std]

// Hotplug-detect lifecycle logic shared by every display interface driver.
//
// The crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Runtimes own the clock and the wakeup mechanism; this
// crate owns every decision about what happens next.

pub mod driver;
pub mod latch;
pub mod machine;
pub mod ops;
pub mod repl;
pub mod scheduler;
pub mod state;
pub mod telemetry;
pub mod timing;

pub use driver::HpdDriver;
pub use latch::EventLatch;
pub use machine::{HpdMachine, Reschedule, Step, StepCause, StepNote};
pub use ops::{HpdHooks, HpdOps};
pub use state::{HpdLevel, HpdState, RecheckOutcome};
pub use timing::HpdTiming;
