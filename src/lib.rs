#![forbid(unsafe_code)]

//! fim_harness: end-to-end scenario harness for a file-integrity-monitoring
//! daemon.
//!
//! The daemon under test watches a directory, classifies each tracked file
//! (OK, NEW, DELETED, FAIL), and periodically rewrites a JSON report. The
//! harness drives it through a fixed mutation scenario and verifies every
//! report against independently computed CRC32 reference checksums:
//!
//! 1. **Fixture management**: randomized baseline files, mutations, and a
//!    byte-exact restore
//! 2. **Process supervision**: detached start, pid-identity signals, and a
//!    graceful/forced stop escalation
//! 3. **Report verification**: staleness-aware polling plus structured
//!    assertions per scenario phase
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use fim_harness::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use fim_harness::core::config::HarnessConfig;
//! use fim_harness::scenario::ScenarioDriver;
//! ```

pub mod prelude;

pub mod core;
pub mod fixture;
pub mod logger;
pub mod poller;
pub mod report;
pub mod scenario;
pub mod supervisor;
pub mod validator;
