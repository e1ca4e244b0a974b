use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use hpd_core::repl::grammar::{self, Command, EdidCommand};
use hpd_core::repl::status::{StatusFormatter, StatusSnapshot};
use hpd_core::{HpdHooks, HpdLevel, HpdState};
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, EmulatorConfig};
use crate::runtime::{HostController, RuntimeError};
use crate::sink::SimulatedSink;

/// Hold time used by `bounce` without an explicit duration.
pub const DEFAULT_BOUNCE_HOLD: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("transcript I/O failed: {0}")]
    Transcript(#[from] io::Error),
}

/// Interactive session driving one controller against a simulated sink.
pub struct Session {
    controller: HostController<SimulatedSink>,
    sink: SimulatedSink,
    transcript: Option<TranscriptLogger>,
    started_at: Instant,
}

impl Session {
    /// Starts the controller and reports the sink's initial HPD level to it,
    /// the way a display driver does when it probes.
    pub fn start(config: &EmulatorConfig) -> Result<Self, SessionError> {
        let timing = config.timing.to_timing().map_err(ConfigError::from)?;
        let sink = if config.session.plugged {
            SimulatedSink::plugged()
        } else {
            SimulatedSink::new()
        };

        let hooks = HpdHooks::none()
            .with_init(|_sink: &mut SimulatedSink| info!("sink hooks initialised"))
            .with_release(|sink: &mut SimulatedSink| {
                info!(counters = ?sink.counters(), "sink hooks released");
            });
        let controller = HostController::spawn(sink.clone(), hooks, timing)?;
        let transcript = config
            .session
            .transcript
            .as_deref()
            .map(TranscriptLogger::create)
            .transpose()?;

        controller.raise();
        Ok(Self {
            controller,
            sink,
            transcript,
            started_at: Instant::now(),
        })
    }

    pub fn sink(&self) -> &SimulatedSink {
        &self.sink
    }

    pub fn controller(&self) -> &HostController<SimulatedSink> {
        &self.controller
    }

    pub fn state(&self) -> HpdState {
        self.controller.state()
    }

    /// Parses and executes one REPL line, returning the response lines.
    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(elapsed, TranscriptRole::Host, trimmed)?;
        }

        let lines = match grammar::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        if let Some(transcript) = self.transcript.as_mut() {
            for output in &lines {
                transcript.append_line(elapsed, TranscriptRole::Emulator, output)?;
            }
        }
        Ok(lines)
    }

    fn execute(&mut self, command: Command<'_>) -> Vec<String> {
        match command {
            Command::Plug => self.set_level(true),
            Command::Unplug => self.set_level(false),
            Command::Bounce(hold) => {
                let hold = hold.unwrap_or(DEFAULT_BOUNCE_HOLD);
                self.sink.set_plugged(false);
                self.controller.raise();
                thread::sleep(hold);
                self.sink.set_plugged(true);
                self.controller.raise();
                vec![format!("OK bounce hold={}", format_duration_short(hold))]
            }
            Command::Edid(EdidCommand::Fail(count)) => {
                self.sink.fail_next(u32::from(count));
                vec![format!("OK edid fail-next={count}")]
            }
            Command::Edid(EdidCommand::Swap) => {
                let identity = self.sink.swap_identity();
                vec![format!("OK edid identity={identity}")]
            }
            Command::Edid(EdidCommand::Ok) => {
                self.sink.clear_failures();
                vec!["OK edid failures cleared".to_string()]
            }
            Command::Wait(duration) => {
                thread::sleep(duration);
                vec![format!(
                    "OK waited {} state={}",
                    format_duration_short(duration),
                    self.state()
                )]
            }
            Command::Status => self.status_lines(),
            Command::History => self.history_lines(),
            Command::Help(topic) => {
                let mut text = String::new();
                // Writing into a String cannot fail.
                let _ = grammar::write_help(&mut text, topic);
                text.lines().map(str::to_string).collect()
            }
        }
    }

    fn set_level(&mut self, plugged: bool) -> Vec<String> {
        self.sink.set_plugged(plugged);
        let accepted = self.controller.raise();
        let label = if plugged { "plug" } else { "unplug" };
        if accepted {
            vec![format!("OK {label} hpd={}", HpdLevel::from_asserted(plugged))]
        } else {
            vec![format!("ERR {label} controller stopped")]
        }
    }

    fn status_lines(&self) -> Vec<String> {
        let snapshot: StatusSnapshot = self.controller.status().with_sink(self.sink.counters());
        let formatter = StatusFormatter::new(&snapshot);

        let mut state = String::new();
        let mut timer = String::new();
        let mut sink = String::new();
        // Writing into a String cannot fail.
        let _ = formatter.write_state_line(&mut state);
        let _ = formatter.write_timer_line(&mut timer);
        let _ = formatter.write_sink_line(&mut sink);
        sink.push_str(if self.sink.output_enabled() {
            " output=enabled"
        } else {
            " output=disabled"
        });
        vec![state, timer, sink]
    }

    fn history_lines(&self) -> Vec<String> {
        let history = self.controller.history();
        if history.is_empty() {
            return vec!["history empty".to_string()];
        }
        history.iter().map(ToString::to_string).collect()
    }

    /// Stops the controller, running its release hook.
    pub fn close(mut self) -> Result<(), SessionError> {
        self.controller.shutdown()?;
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.flush()?;
        }
        Ok(())
    }
}

struct TranscriptLogger {
    writer: BufWriter<File>,
}

impl TranscriptLogger {
    fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# HPD emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn format_duration_short(duration: Duration) -> String {
    if duration.as_secs() == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}
