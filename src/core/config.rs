//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{HarnessError, Result};

/// Full harness configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct HarnessConfig {
    pub daemon: DaemonConfig,
    pub fixture: FixtureConfig,
    pub poll: PollConfig,
    pub validation: ValidationConfig,
    pub log: LogConfig,
}

/// Daemon-under-test launch and lifecycle knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Daemon executable (resolved via PATH if not absolute).
    pub binary: PathBuf,
    /// Scan interval handed to the daemon via `-i`, in seconds.
    pub scan_interval_secs: u64,
    /// Wait after spawn before checking liveness.
    pub start_grace_ms: u64,
    /// Wait after each stop signal before rechecking liveness.
    pub stop_grace_ms: u64,
}

/// Fixture directory layout and content generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FixtureConfig {
    /// Directory the daemon is pointed at via `-p`.
    pub dir: PathBuf,
    /// Report artifact path handed to the daemon via `-j`.
    pub report_path: PathBuf,
    /// Number of baseline files created at setup.
    pub file_count: usize,
    /// Random alphanumeric block length range (inclusive).
    pub block_len_min: usize,
    pub block_len_max: usize,
    /// Block repeat count range (inclusive).
    pub repeat_min: usize,
    pub repeat_max: usize,
}

/// Report freshness polling: bounded exponential backoff plus a deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollConfig {
    /// First sleep between staleness checks.
    pub initial_interval_ms: u64,
    /// Backoff cap; intervals double up to this.
    pub max_interval_ms: u64,
    /// Overall deadline for one fresh-snapshot wait. Zero means
    /// `3 * scan_interval + 30s` is derived at runtime.
    pub deadline_secs: u64,
}

/// Assertion behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Abort a phase on the first mismatch instead of collecting all of them.
    pub fail_fast: bool,
}

/// Run-log destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// JSONL run log path. Empty disables file logging.
    pub jsonl_path: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ficheda"),
            scan_interval_secs: 33,
            start_grace_ms: 5_000,
            stop_grace_ms: 5_000,
        }
    }
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/tmp/fimh_fixture"),
            report_path: PathBuf::from("/tmp/fimh_report.json"),
            file_count: 5,
            block_len_min: 1_000,
            block_len_max: 9_999,
            repeat_min: 1_000,
            repeat_max: 9_999,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            max_interval_ms: 5_000,
            deadline_secs: 0,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { fail_fast: true }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            jsonl_path: PathBuf::from("/tmp/fimh_run.jsonl"),
        }
    }
}

impl HarnessConfig {
    /// Default configuration path (`~/.config/fimh/config.toml`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[FIM-CONFIG] WARNING: HOME not set, falling back to /tmp");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        home_dir.join(".config").join("fimh").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from the default
    /// path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| HarnessError::FixtureIo {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(HarnessError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Effective per-wait deadline: configured value, or derived from the
    /// daemon scan interval when left at zero.
    #[must_use]
    pub fn poll_deadline(&self) -> Duration {
        if self.poll.deadline_secs > 0 {
            Duration::from_secs(self.poll.deadline_secs)
        } else {
            Duration::from_secs(3 * self.daemon.scan_interval_secs + 30)
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        // daemon
        if let Some(raw) = env_var("FIMH_DAEMON_BINARY") {
            self.daemon.binary = PathBuf::from(raw);
        }
        set_env_u64(
            "FIMH_DAEMON_SCAN_INTERVAL_SECS",
            &mut self.daemon.scan_interval_secs,
        )?;
        set_env_u64("FIMH_DAEMON_START_GRACE_MS", &mut self.daemon.start_grace_ms)?;
        set_env_u64("FIMH_DAEMON_STOP_GRACE_MS", &mut self.daemon.stop_grace_ms)?;

        // fixture
        if let Some(raw) = env_var("FIMH_FIXTURE_DIR") {
            self.fixture.dir = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("FIMH_FIXTURE_REPORT_PATH") {
            self.fixture.report_path = PathBuf::from(raw);
        }
        set_env_usize("FIMH_FIXTURE_FILE_COUNT", &mut self.fixture.file_count)?;
        set_env_usize("FIMH_FIXTURE_BLOCK_LEN_MIN", &mut self.fixture.block_len_min)?;
        set_env_usize("FIMH_FIXTURE_BLOCK_LEN_MAX", &mut self.fixture.block_len_max)?;
        set_env_usize("FIMH_FIXTURE_REPEAT_MIN", &mut self.fixture.repeat_min)?;
        set_env_usize("FIMH_FIXTURE_REPEAT_MAX", &mut self.fixture.repeat_max)?;

        // poll
        set_env_u64(
            "FIMH_POLL_INITIAL_INTERVAL_MS",
            &mut self.poll.initial_interval_ms,
        )?;
        set_env_u64("FIMH_POLL_MAX_INTERVAL_MS", &mut self.poll.max_interval_ms)?;
        set_env_u64("FIMH_POLL_DEADLINE_SECS", &mut self.poll.deadline_secs)?;

        // validation
        set_env_bool("FIMH_VALIDATION_FAIL_FAST", &mut self.validation.fail_fast)?;

        // log
        if let Some(raw) = env_var("FIMH_LOG_JSONL_PATH") {
            self.log.jsonl_path = PathBuf::from(raw);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.daemon.binary.as_os_str().is_empty() {
            return Err(HarnessError::InvalidConfig {
                details: "daemon.binary must not be empty".to_string(),
            });
        }
        if self.daemon.scan_interval_secs == 0 {
            return Err(HarnessError::InvalidConfig {
                details: "daemon.scan_interval_secs must be >= 1".to_string(),
            });
        }

        if self.fixture.file_count < 3 {
            // The scenario needs one file to delete, a different one to
            // mutate, and at least one left untouched.
            return Err(HarnessError::InvalidConfig {
                details: format!(
                    "fixture.file_count must be >= 3, got {}",
                    self.fixture.file_count
                ),
            });
        }
        if self.fixture.block_len_min == 0 || self.fixture.block_len_min > self.fixture.block_len_max
        {
            return Err(HarnessError::InvalidConfig {
                details: format!(
                    "fixture block length range [{}, {}] must be non-empty and positive",
                    self.fixture.block_len_min, self.fixture.block_len_max
                ),
            });
        }
        if self.fixture.repeat_min == 0 || self.fixture.repeat_min > self.fixture.repeat_max {
            return Err(HarnessError::InvalidConfig {
                details: format!(
                    "fixture repeat range [{}, {}] must be non-empty and positive",
                    self.fixture.repeat_min, self.fixture.repeat_max
                ),
            });
        }
        if self.fixture.report_path.starts_with(&self.fixture.dir) {
            // The daemon would track its own report as a monitored file.
            return Err(HarnessError::InvalidConfig {
                details: "fixture.report_path must lie outside fixture.dir".to_string(),
            });
        }

        if self.poll.initial_interval_ms == 0 {
            return Err(HarnessError::InvalidConfig {
                details: "poll.initial_interval_ms must be >= 1".to_string(),
            });
        }
        if self.poll.max_interval_ms < self.poll.initial_interval_ms {
            return Err(HarnessError::InvalidConfig {
                details: format!(
                    "poll.max_interval_ms ({}) must be >= poll.initial_interval_ms ({})",
                    self.poll.max_interval_ms, self.poll.initial_interval_ms
                ),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw
            .parse::<u64>()
            .map_err(|error| HarnessError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

fn set_env_usize(name: &str, slot: &mut usize) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw
            .parse::<usize>()
            .map_err(|error| HarnessError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

fn set_env_bool(name: &str, slot: &mut bool) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw
            .parse::<bool>()
            .map_err(|error| HarnessError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}
