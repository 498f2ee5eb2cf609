//! Staleness-aware report polling.
//!
//! The freshness signal is the artifact's modification stamp: a snapshot is
//! fresh once the stamp differs from the last one observed (or the artifact
//! newly exists). Transient stat/read failures count as "not yet ready".
//! Waiting uses bounded exponential backoff under an explicit deadline, so a
//! daemon that never rewrites the artifact surfaces as a reported timeout
//! instead of an indefinite loop.
//!
//! Known accepted limitation: two artifact rewrites landing within one
//! mtime-resolution window are indistinguishable. Closing that race needs a
//! report version counter or an atomic rename protocol in the artifact
//! format, which the harness does not own.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crate::core::config::PollConfig;
use crate::core::errors::{HarnessError, Result};
use crate::report::Snapshot;

/// Waits for the report artifact to become newer than last observed, then
/// parses it.
pub struct SnapshotPoller {
    report_path: PathBuf,
    initial_interval: Duration,
    max_interval: Duration,
    deadline: Duration,
}

impl SnapshotPoller {
    #[must_use]
    pub fn new(report_path: PathBuf, config: &PollConfig, deadline: Duration) -> Self {
        Self {
            report_path,
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            max_interval: Duration::from_millis(config.max_interval_ms),
            deadline,
        }
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    /// Block until the artifact's modification stamp differs from
    /// `last_seen` (or the artifact newly exists when `last_seen` is
    /// `None`), then parse it into a snapshot.
    ///
    /// Parse failure is fatal; an expired deadline is a `PollDeadline`
    /// error, never a silent retry.
    pub fn wait_for_fresh_snapshot(&self, last_seen: Option<SystemTime>) -> Result<Snapshot> {
        let started = Instant::now();
        let mut interval = self.initial_interval;

        loop {
            if let Some(mtime) = self.stat_mtime()
                && last_seen != Some(mtime)
                && let Some(raw) = self.read_artifact()
            {
                return Snapshot::parse(&raw, &self.report_path, mtime);
            }

            let elapsed = started.elapsed();
            if elapsed >= self.deadline {
                return Err(HarnessError::PollDeadline {
                    path: self.report_path.clone(),
                    waited_secs: elapsed.as_secs(),
                });
            }

            let remaining = self.deadline - elapsed;
            thread::sleep(interval.min(remaining));
            interval = (interval * 2).min(self.max_interval);
        }
    }

    /// Artifact mtime, or `None` while the artifact is missing or unstattable.
    fn stat_mtime(&self) -> Option<SystemTime> {
        fs::metadata(&self.report_path)
            .and_then(|meta| meta.modified())
            .ok()
    }

    /// Artifact contents, or `None` on a transient read failure (the next
    /// poll iteration will retry).
    fn read_artifact(&self) -> Option<String> {
        fs::read_to_string(&self.report_path).ok()
    }
}
