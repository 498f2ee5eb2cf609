//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use fim_harness::prelude::*;
//! ```

// Core
pub use crate::core::config::HarnessConfig;
pub use crate::core::errors::{HarnessError, Result};

// Fixture
pub use crate::fixture::checksum::{Checksum, checksum_bytes, checksum_file};
pub use crate::fixture::{FileRecord, FixtureManager};

// Supervision
pub use crate::supervisor::{DaemonSignal, ProcessSupervisor};

// Reports
pub use crate::poller::SnapshotPoller;
pub use crate::report::{EntryView, FileStatus, ReportEntry, ReportModel, Snapshot};

// Scenario
pub use crate::scenario::{Phase, ScenarioDriver, ScenarioState, ScenarioSummary};
pub use crate::validator::Mismatch;
