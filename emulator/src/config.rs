//! Emulator configuration: optional TOML file plus command-line overrides.
//!
//! Precedence is CLI flag, then file, then the controller defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use hpd_core::HpdTiming;
use hpd_core::timing::TimingError;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid timing: {0}")]
    Timing(#[from] TimingError),
}

/// Command-line interface of the emulator binary.
#[derive(Debug, Default, Parser)]
#[command(name = "hpd-emulator", about = "Interactive hotplug-detect controller emulator")]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Delay before checking the plug state after an event, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub stabilize_ms: Option<u64>,

    /// How long an enabled sink may drop HPD before a full reset, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub drop_timeout_ms: Option<u64>,

    /// Delay between reset and the plug check, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub check_plug_ms: Option<u64>,

    /// Delay before (and between) EDID reads, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub check_edid_ms: Option<u64>,

    /// EDID read or recheck attempts before giving up.
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u8>,

    /// Start with the sink plugged in.
    #[arg(long)]
    pub plugged: bool,

    /// Write a transcript of the session to this file.
    #[arg(long, value_name = "PATH")]
    pub transcript: Option<PathBuf>,

    /// Log filter directives (overrides `RUST_LOG`).
    #[arg(long, value_name = "FILTER")]
    pub log: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EmulatorConfig {
    pub timing: TimingConfig,
    pub session: SessionConfig,
}

/// `[timing]` table, in milliseconds.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub stabilize_ms: u64,
    pub drop_timeout_ms: u64,
    pub check_plug_ms: u64,
    pub check_edid_ms: u64,
    pub max_edid_attempts: u8,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let defaults = HpdTiming::new();
        Self {
            stabilize_ms: millis(defaults.stabilize),
            drop_timeout_ms: millis(defaults.drop_timeout),
            check_plug_ms: millis(defaults.check_plug_delay),
            check_edid_ms: millis(defaults.check_edid_delay),
            max_edid_attempts: defaults.max_edid_attempts,
        }
    }
}

impl TimingConfig {
    pub fn to_timing(&self) -> Result<HpdTiming, TimingError> {
        let timing = HpdTiming::new()
            .with_stabilize(Duration::from_millis(self.stabilize_ms))
            .with_drop_timeout(Duration::from_millis(self.drop_timeout_ms))
            .with_check_plug_delay(Duration::from_millis(self.check_plug_ms))
            .with_check_edid_delay(Duration::from_millis(self.check_edid_ms))
            .with_max_edid_attempts(self.max_edid_attempts);
        timing.validate()?;
        Ok(timing)
    }
}

/// `[session]` table.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub plugged: bool,
    pub transcript: Option<PathBuf>,
}

impl EmulatorConfig {
    /// Loads the file named by `--config` (if any) and applies the CLI overrides.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(cli);
        config.timing.to_timing()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_overrides(&mut self, cli: &Cli) {
        let timing = &mut self.timing;
        if let Some(value) = cli.stabilize_ms {
            timing.stabilize_ms = value;
        }
        if let Some(value) = cli.drop_timeout_ms {
            timing.drop_timeout_ms = value;
        }
        if let Some(value) = cli.check_plug_ms {
            timing.check_plug_ms = value;
        }
        if let Some(value) = cli.check_edid_ms {
            timing.check_edid_ms = value;
        }
        if let Some(value) = cli.max_attempts {
            timing.max_edid_attempts = value;
        }
        if cli.plugged {
            self.session.plugged = true;
        }
        if let Some(path) = &cli.transcript {
            self.session.transcript = Some(path.clone());
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
