//! Daemon process lifecycle: detached start, pid-identity signaling, and
//! two-step graceful/forced stop escalation.
//!
//! The spawned daemon is driven through a structured child handle rather
//! than process-table text matching, so signals always land on the exact
//! process the harness started. Token-exact `/proc/<pid>/comm` discovery is
//! kept only for the precondition check that no pre-existing daemon instance
//! is running before a fixture reset.

#![allow(missing_docs)]

use std::fs;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::core::config::DaemonConfig;
use crate::core::errors::{HarnessError, Result};

/// Signals the harness may send the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonSignal {
    /// Out-of-cycle full re-evaluation (SIGUSR1).
    Rescan,
    /// Clean shutdown request (SIGTERM).
    GracefulStop,
    /// Unconditional termination, only after graceful stop failed (SIGKILL).
    ForcedStop,
}

impl DaemonSignal {
    const fn as_nix(self) -> Signal {
        match self {
            Self::Rescan => Signal::SIGUSR1,
            Self::GracefulStop => Signal::SIGTERM,
            Self::ForcedStop => Signal::SIGKILL,
        }
    }

    /// Wire name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rescan => "rescan",
            Self::GracefulStop => "graceful-stop",
            Self::ForcedStop => "forced-stop",
        }
    }
}

/// Starts, signals, and stops the daemon under test.
pub struct ProcessSupervisor {
    config: DaemonConfig,
    child: Option<Child>,
}

impl ProcessSupervisor {
    #[must_use]
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            config,
            child: None,
        }
    }

    /// Executable name used for process discovery.
    #[must_use]
    pub fn daemon_name(&self) -> String {
        self.config
            .binary
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
    }

    /// Pid of the spawned daemon, if one is held.
    #[must_use]
    pub fn pid(&self) -> Option<i32> {
        self.child.as_ref().map(|c| i32::try_from(c.id()).unwrap_or(i32::MAX))
    }

    /// Scan `/proc` for a process whose `comm` token-exactly matches the
    /// daemon executable name. Substring matches against unrelated process
    /// names must not count.
    ///
    /// `comm` is truncated to 15 bytes by the kernel, so the comparison uses
    /// the same truncation.
    pub fn discover_existing(&self) -> Result<Option<i32>> {
        let name = self.daemon_name();
        if name.is_empty() {
            return Ok(None);
        }
        let wanted: String = name.chars().take(15).collect();

        let entries = match fs::read_dir("/proc") {
            Ok(entries) => entries,
            // Non-procfs platform: nothing discoverable, not an error.
            Err(_) => return Ok(None),
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Ok(pid) = file_name.to_string_lossy().parse::<i32>() else {
                continue;
            };
            let comm_path = entry.path().join("comm");
            let Ok(comm) = fs::read_to_string(&comm_path) else {
                continue; // process vanished mid-scan
            };
            if comm.trim_end() == wanted {
                return Ok(Some(pid));
            }
        }
        Ok(None)
    }

    /// Whether the spawned daemon is still alive. Reaps the child if it has
    /// already exited.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(_)) => {
                    self.child = None;
                    false
                }
                Err(_) => false,
            },
            None => false,
        }
    }

    /// Fatal abort when liveness is a precondition.
    pub fn ensure_running(&mut self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(HarnessError::DaemonNotRunning {
                details: format!("'{}' exited or was never started", self.daemon_name()),
            })
        }
    }

    /// Launch the daemon against the given fixture directory, scan interval,
    /// and report path, detached from the harness's terminal and process
    /// group. Waits the start grace period, then verifies liveness.
    pub fn start(&mut self, fixture_dir: &Path, report_path: &Path) -> Result<()> {
        let interval = self.config.scan_interval_secs.to_string();
        let args: Vec<&std::ffi::OsStr> = vec![
            "-p".as_ref(),
            fixture_dir.as_os_str(),
            "-i".as_ref(),
            interval.as_ref(),
            "-j".as_ref(),
            report_path.as_os_str(),
        ];
        self.spawn_detached(&args)?;

        thread::sleep(Duration::from_millis(self.config.start_grace_ms));
        if self.is_running() {
            Ok(())
        } else {
            Err(HarnessError::DaemonNotStarted {
                details: format!("'{}' exited within the start grace period", self.daemon_name()),
            })
        }
    }

    /// Raw detached spawn of the configured binary with explicit arguments.
    ///
    /// `start()` composes the daemon's documented CLI on top of this; tests
    /// use it directly to supervise stand-in processes.
    pub fn spawn_detached(&mut self, args: &[&std::ffi::OsStr]) -> Result<()> {
        if self.child.is_some() {
            return Err(HarnessError::FixtureState {
                details: "supervisor already holds a running child".to_string(),
            });
        }

        let mut command = Command::new(&self.config.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|e| HarnessError::DaemonNotStarted {
            details: format!("spawn of '{}' failed: {e}", self.config.binary.display()),
        })?;
        self.child = Some(child);
        Ok(())
    }

    /// Send a signal to the daemon by process identity. Fire-and-forget:
    /// callers must separately wait or poll for the effect.
    ///
    /// A disappeared process (ESRCH) is not an error; for stop signals that
    /// is already the desired outcome.
    pub fn signal(&mut self, signal: DaemonSignal) -> Result<()> {
        let Some(pid) = self.pid() else {
            return Err(HarnessError::DaemonNotRunning {
                details: format!("cannot send {} without a spawned daemon", signal.name()),
            });
        };
        match kill(Pid::from_raw(pid), signal.as_nix()) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(HarnessError::SignalDelivery {
                pid,
                details: errno.to_string(),
            }),
        }
    }

    /// Graceful-stop, grace period, recheck; forced-stop, grace period,
    /// recheck; still alive means unrecoverable, no further retries.
    pub fn stop_with_escalation(&mut self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        self.signal(DaemonSignal::GracefulStop)?;
        thread::sleep(Duration::from_millis(self.config.stop_grace_ms));
        if !self.is_running() {
            return Ok(());
        }

        self.signal(DaemonSignal::ForcedStop)?;
        thread::sleep(Duration::from_millis(self.config.stop_grace_ms));
        if !self.is_running() {
            return Ok(());
        }

        let pid = self.pid().unwrap_or(-1);
        Err(HarnessError::DaemonUnresponsive { pid })
    }
}

impl Drop for ProcessSupervisor {
    /// Last-resort cleanup so a panicking harness never orphans the daemon.
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                let _ = kill(
                    Pid::from_raw(i32::try_from(child.id()).unwrap_or(i32::MAX)),
                    Signal::SIGKILL,
                );
                let _ = child.wait();
            }
        }
    }
}
