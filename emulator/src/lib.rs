//! Host-side hotplug controller runtime and interactive emulator.
//!
//! [`runtime::HostController`] runs an [`hpd_core::HpdDriver`] on a dedicated
//! worker thread, [`sink::SimulatedSink`] stands in for the panel, and
//! [`session::Session`] drives both from REPL commands.

pub mod config;
pub mod runtime;
pub mod session;
pub mod sink;
