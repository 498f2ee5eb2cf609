//! Scenario driver: sequences the mutation phases against the daemon under
//! test and turns fresh reports into pass/fail verdicts.
//!
//! The run is a strict linear sequence; the first failure anywhere aborts
//! the whole run. The abort path always attempts an escalated stop of the
//! daemon before returning, and deliberately leaves the fixture directory
//! untouched for postmortem inspection. SIGINT/SIGTERM on the harness
//! itself route into the same abort path.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::core::config::HarnessConfig;
use crate::core::errors::{HarnessError, Result};
use crate::fixture::checksum::Checksum;
use crate::fixture::{FileRecord, FixtureManager};
use crate::logger::jsonl::{EventType, LogEntry, RunLog, Severity};
use crate::poller::SnapshotPoller;
use crate::report::ReportModel;
use crate::supervisor::{DaemonSignal, ProcessSupervisor};
use crate::validator;

/// Scenario phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reset,
    Baseline,
    Add,
    Delete,
    Mutate,
    Restore,
    FinalBaseline,
    Shutdown,
}

impl Phase {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Baseline => "baseline",
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Mutate => "mutate",
            Self::Restore => "restore",
            Self::FinalBaseline => "final-baseline",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Explicit scenario state threaded through the driver: expected file
/// records plus the bookkeeping needed to describe in-flight mutations.
#[derive(Debug, Default)]
pub struct ScenarioState {
    /// Currently-expected tracked files with their ground-truth checksums.
    pub records: Vec<FileRecord>,
    /// Path of the add-phase copy (expected NEW).
    pub added_copy: Option<PathBuf>,
    /// Path deleted from disk but still expected in reports (DELETED).
    pub removed: Option<PathBuf>,
    /// Path whose content was overwritten (expected FAIL).
    pub mutated: Option<PathBuf>,
    /// Checksum of the mutated path's fresh content.
    pub fresh_checksum: Option<Checksum>,
    /// Report artifact stamp of the last snapshot consumed.
    pub last_seen_mtime: Option<SystemTime>,
}

/// Names of the phases a successful run completed, for the CLI summary.
#[derive(Debug, Clone, Default)]
pub struct ScenarioSummary {
    pub phases: Vec<&'static str>,
}

/// Drives the whole scenario: fixture mutations, daemon lifecycle, report
/// polling, and assertions.
pub struct ScenarioDriver {
    config: HarnessConfig,
    fixture: FixtureManager,
    supervisor: ProcessSupervisor,
    poller: SnapshotPoller,
    log: RunLog,
    interrupted: Arc<AtomicBool>,
}

impl ScenarioDriver {
    #[must_use]
    pub fn new(config: HarnessConfig, log: RunLog) -> Self {
        let fixture = FixtureManager::new(config.fixture.clone());
        let supervisor = ProcessSupervisor::new(config.daemon.clone());
        let poller = SnapshotPoller::new(
            fixture.report_path().to_path_buf(),
            &config.poll,
            config.poll_deadline(),
        );

        let interrupted = Arc::new(AtomicBool::new(false));
        for sig in [SIGINT, SIGTERM] {
            if let Err(e) = signal_hook::flag::register(sig, Arc::clone(&interrupted)) {
                eprintln!("[FIM-SIGNAL] failed to register signal {sig}: {e}");
            }
        }

        Self {
            config,
            fixture,
            supervisor,
            poller,
            log,
            interrupted,
        }
    }

    /// Execute the full scenario. On any failure the daemon is stopped with
    /// escalation before the error is returned; the fixture directory is
    /// never cleaned up on failure.
    pub fn run(&mut self) -> Result<ScenarioSummary> {
        self.log
            .write(&LogEntry::new(EventType::RunStart, Severity::Info));

        let outcome = self.run_phases();

        match &outcome {
            Ok(_) => {
                self.log
                    .write(&LogEntry::new(EventType::RunFinish, Severity::Info).ok(true));
            }
            Err(err) => {
                self.log.write(
                    &LogEntry::new(EventType::Error, Severity::Critical)
                        .details(err.to_string()),
                );
                self.abort_daemon();
                self.log
                    .write(&LogEntry::new(EventType::RunFinish, Severity::Critical).ok(false));
            }
        }
        self.log.flush();
        outcome
    }

    fn run_phases(&mut self) -> Result<ScenarioSummary> {
        let mut summary = ScenarioSummary::default();
        let mut state = ScenarioState::default();

        // reset + populate
        self.enter_phase(Phase::Reset)?;
        self.fixture.reset(&self.supervisor)?;
        state.records = self
            .fixture
            .create_baseline_set(self.config.fixture.file_count)?;
        for record in &state.records {
            println!("  {}: {}", record.path.display(), record.baseline_checksum);
        }
        summary.phases.push(Phase::Reset.name());

        // start daemon + request an out-of-cycle rescan
        println!(
            "Starting daemon '{}' (interval {}s)...",
            self.supervisor.daemon_name(),
            self.config.daemon.scan_interval_secs
        );
        let fixture_dir = self.fixture.dir().to_path_buf();
        let report_path = self.fixture.report_path().to_path_buf();
        self.supervisor.start(&fixture_dir, &report_path)?;
        self.log
            .write(&LogEntry::new(EventType::DaemonStart, Severity::Info).ok(true));
        self.send_signal(DaemonSignal::Rescan)?;

        // baseline must be perfect
        self.enter_phase(Phase::Baseline)?;
        let model = self.next_model(&mut state)?;
        self.verdict(
            Phase::Baseline,
            validator::check_baseline_perfect(&model, &state.records),
        )?;
        summary.phases.push(Phase::Baseline.name());

        // add a copy of the first baseline file
        self.enter_phase(Phase::Add)?;
        let copy_source = state.records[0].path.clone();
        let copy = self.fixture.add_copy(&copy_source)?;
        state.added_copy = Some(copy.clone());
        self.print_listing();
        let model = self.next_model(&mut state)?;
        let mut mismatches = validator::check_entry_count(&model, state.records.len() + 1);
        mismatches.extend(validator::check_added(&model, &copy));
        self.verdict(Phase::Add, mismatches)?;
        summary.phases.push(Phase::Add.name());

        // delete the copied original; it must stay reported as DELETED
        self.enter_phase(Phase::Delete)?;
        self.fixture.remove_file(&copy_source)?;
        state.removed = Some(copy_source.clone());
        self.print_listing();
        let model = self.next_model(&mut state)?;
        let mut mismatches = validator::check_entry_count(&model, state.records.len() + 1);
        mismatches.extend(validator::check_deleted(&model, &copy_source));
        self.verdict(Phase::Delete, mismatches)?;
        summary.phases.push(Phase::Delete.name());

        // mutate a different original; the backup side file will surface as
        // NEW, so no entry-count check in this phase
        self.enter_phase(Phase::Mutate)?;
        let mutate_target = state.records[1].path.clone();
        let fresh = self.fixture.mutate_file(&mutate_target)?;
        println!("  {}: {fresh}", mutate_target.display());
        state.mutated = Some(mutate_target.clone());
        state.fresh_checksum = Some(fresh.clone());
        self.print_listing();
        let model = self.next_model(&mut state)?;
        self.verdict(
            Phase::Mutate,
            validator::check_changed(
                &model,
                &mutate_target,
                &state.records[1].baseline_checksum,
                &fresh,
            ),
        )?;
        summary.phases.push(Phase::Mutate.name());

        // put every file back to its baseline content
        self.enter_phase(Phase::Restore)?;
        self.fixture.restore()?;
        self.print_listing();
        summary.phases.push(Phase::Restore.name());

        // the final report must be perfect again
        self.enter_phase(Phase::FinalBaseline)?;
        let model = self.next_model(&mut state)?;
        self.verdict(
            Phase::FinalBaseline,
            validator::check_baseline_perfect(&model, &state.records),
        )?;
        summary.phases.push(Phase::FinalBaseline.name());

        // clean shutdown, escalating only if the daemon ignores it
        self.enter_phase(Phase::Shutdown)?;
        self.supervisor.stop_with_escalation()?;
        self.log
            .write(&LogEntry::new(EventType::DaemonStop, Severity::Info).ok(true));
        summary.phases.push(Phase::Shutdown.name());

        Ok(summary)
    }

    /// Interrupt checkpoint + phase banner.
    fn enter_phase(&mut self, phase: Phase) -> Result<()> {
        if self.interrupted.load(Ordering::Relaxed) {
            return Err(HarnessError::Interrupted);
        }
        println!("\n=== phase: {} ===", phase.name());
        self.log
            .write(&LogEntry::new(EventType::PhaseStart, Severity::Info).phase(phase.name()));
        Ok(())
    }

    /// Wait for the next fresh report and build the path-keyed model.
    /// The daemon must still be alive while we wait.
    fn next_model(&mut self, state: &mut ScenarioState) -> Result<ReportModel> {
        self.supervisor.ensure_running()?;
        println!("Waiting for a fresh report...");
        let snapshot = self.poller.wait_for_fresh_snapshot(state.last_seen_mtime)?;
        state.last_seen_mtime = Some(snapshot.mtime());
        let mut entry = LogEntry::new(EventType::SnapshotObserved, Severity::Info);
        entry.entries = Some(snapshot.len());
        self.log.write(&entry);
        Ok(ReportModel::from_snapshot(&snapshot))
    }

    fn send_signal(&mut self, signal: DaemonSignal) -> Result<()> {
        self.supervisor.signal(signal)?;
        let mut entry = LogEntry::new(EventType::SignalSent, Severity::Info);
        entry.signal = Some(signal.name().to_string());
        self.log.write(&entry);
        Ok(())
    }

    fn verdict(&mut self, phase: Phase, mismatches: Vec<validator::Mismatch>) -> Result<()> {
        let result =
            validator::into_verdict(phase.name(), mismatches, self.config.validation.fail_fast);
        match &result {
            Ok(()) => {
                println!("Phase '{}' passed.", phase.name());
                self.log.write(
                    &LogEntry::new(EventType::PhaseVerdict, Severity::Info)
                        .phase(phase.name())
                        .ok(true),
                );
            }
            Err(err) => {
                let mut entry = LogEntry::new(EventType::PhaseVerdict, Severity::Critical)
                    .phase(phase.name())
                    .ok(false);
                entry.error_code = Some(err.code().to_string());
                entry.error_message = Some(err.to_string());
                self.log.write(&entry);
            }
        }
        result
    }

    /// Best-effort escalated stop on the failure path. Its own failure is
    /// logged but never masks the original error.
    fn abort_daemon(&mut self) {
        match self.supervisor.stop_with_escalation() {
            Ok(()) => {
                self.log
                    .write(&LogEntry::new(EventType::DaemonStop, Severity::Warning).ok(true));
            }
            Err(stop_err) => {
                eprintln!("fimh: abort cleanup failed: {stop_err}");
                self.log.write(
                    &LogEntry::new(EventType::DaemonStop, Severity::Critical)
                        .ok(false)
                        .details(stop_err.to_string()),
                );
            }
        }
    }

    fn print_listing(&self) {
        match self.fixture.list_dir() {
            Ok(lines) => {
                println!("{}:", self.fixture.dir().display());
                for line in lines {
                    println!("  {line}");
                }
            }
            Err(e) => eprintln!("fimh: cannot list fixture dir: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{DaemonConfig, FixtureConfig, PollConfig};
    use std::path::Path;

    fn test_config(root: &Path) -> HarnessConfig {
        HarnessConfig {
            daemon: DaemonConfig {
                binary: PathBuf::from("/nonexistent_fimh/fimtestd"),
                scan_interval_secs: 1,
                start_grace_ms: 10,
                stop_grace_ms: 10,
            },
            fixture: FixtureConfig {
                dir: root.join("fixture"),
                report_path: root.join("report.json"),
                file_count: 3,
                block_len_min: 10,
                block_len_max: 20,
                repeat_min: 2,
                repeat_max: 4,
            },
            poll: PollConfig {
                initial_interval_ms: 10,
                max_interval_ms: 20,
                deadline_secs: 1,
            },
            ..HarnessConfig::default()
        }
    }

    #[test]
    fn phase_names_are_stable() {
        assert_eq!(Phase::Baseline.name(), "baseline");
        assert_eq!(Phase::FinalBaseline.name(), "final-baseline");
    }

    #[test]
    fn missing_daemon_binary_aborts_after_fixture_setup() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        let fixture_dir = config.fixture.dir.clone();

        let mut driver = ScenarioDriver::new(config, RunLog::disabled());
        let err = driver.run().unwrap_err();
        assert_eq!(err.code(), "FIM-3001");

        // Fixture is left in place for postmortem inspection.
        assert!(fixture_dir.exists());
        assert!(fixture_dir.join("file_0000.data").exists());
    }

    #[test]
    fn interrupt_flag_aborts_before_any_phase() {
        let tmp = tempfile::tempdir().unwrap();
        let mut driver = ScenarioDriver::new(test_config(tmp.path()), RunLog::disabled());
        driver.interrupted.store(true, Ordering::Relaxed);

        let err = driver.run().unwrap_err();
        assert_eq!(err.code(), "FIM-5002");
    }
}
