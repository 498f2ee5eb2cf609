//! JSONL run log: append-only line-delimited JSON of everything the harness
//! did and observed.
//!
//! Each line is a self-contained JSON object, assembled in memory and
//! written with a single `write_all` so a tailing process never sees a
//! partial line.
//!
//! Degradation chain: primary file → stderr with `[FIM-LOG]` prefix →
//! silent discard. A run must never abort because logging failed.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Event types matching the harness activity model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStart,
    RunFinish,
    PhaseStart,
    PhaseVerdict,
    DaemonStart,
    DaemonStop,
    SignalSent,
    SnapshotObserved,
    Error,
}

/// A single JSONL entry; all fields optional except `ts`, `event`,
/// `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Scenario phase name (when applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Affected path (fixture file or report artifact).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Signal name for signal_sent events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    /// Entry count for snapshot_observed events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
    /// Whether the step succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// FIM error code when a step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            severity,
            phase: None,
            path: None,
            signal: None,
            entries: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    #[must_use]
    pub fn phase(mut self, phase: &str) -> Self {
        self.phase = Some(phase.to_string());
        self
    }

    #[must_use]
    pub fn path(mut self, path: &Path) -> Self {
        self.path = Some(path.display().to_string());
        self
    }

    #[must_use]
    pub fn ok(mut self, ok: bool) -> Self {
        self.ok = Some(ok);
        self
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Append-only JSONL run-log writer with stderr fallback.
pub struct RunLog {
    writer: Option<BufWriter<File>>,
    state: WriterState,
}

impl RunLog {
    /// Open the run log for appending. An unwritable path degrades to
    /// stderr rather than failing.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        if path.as_os_str().is_empty() {
            return Self {
                writer: None,
                state: WriterState::Discard,
            };
        }
        match open_append(path) {
            Ok(file) => Self {
                writer: Some(BufWriter::with_capacity(16 * 1024, file)),
                state: WriterState::Normal,
            },
            Err(e) => {
                let _ = writeln!(
                    io::stderr(),
                    "[FIM-LOG] cannot open {}: {e}; logging to stderr",
                    path.display()
                );
                Self {
                    writer: None,
                    state: WriterState::Stderr,
                }
            }
        }
    }

    /// A writer that drops everything. Used by tests and `--quiet` runs.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            writer: None,
            state: WriterState::Discard,
        }
    }

    /// Write a single entry as one atomic JSONL line.
    pub fn write(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[FIM-LOG] serialize error: {e}");
                return;
            }
        };

        match self.state {
            WriterState::Normal => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(line.as_bytes()).is_err() {
                        self.writer = None;
                        self.state = WriterState::Stderr;
                        let _ = write!(io::stderr(), "[FIM-LOG] {line}");
                    }
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[FIM-LOG] {line}");
            }
            WriterState::Discard => {}
        }
    }

    /// Flush buffered lines.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state, for diagnostics.
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
