//! Integration tests: CLI smoke tests plus full-pipeline scenarios where the
//! daemon's reports are synthesized from the fixture's actual on-disk state.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use serde_json::Value;

use fim_harness::core::config::{DaemonConfig, FixtureConfig, PollConfig};
use fim_harness::fixture::checksum::checksum_file;
use fim_harness::fixture::{FileRecord, FixtureManager};
use fim_harness::poller::SnapshotPoller;
use fim_harness::report::{FileStatus, ReportEntry, ReportModel, Snapshot};
use fim_harness::supervisor::{DaemonSignal, ProcessSupervisor};
use fim_harness::validator;

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: fimh [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_flag_prints_version() {
    let result = common::run_cli_case("version_flag_prints_version", &["--version"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains(env!("CARGO_PKG_VERSION")),
        "missing version; log: {}",
        result.log_path.display()
    );
}

#[test]
fn config_command_prints_effective_toml() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "[daemon]\nscan_interval_secs = 7\n").unwrap();

    let result = common::run_cli_case(
        "config_command_prints_effective_toml",
        &[
            "--no-color",
            "--config",
            config_path.to_str().unwrap(),
            "config",
        ],
    );
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("scan_interval_secs = 7"),
        "override not reflected; log: {}",
        result.log_path.display()
    );
}

#[test]
fn config_json_output_is_parseable() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "[fixture]\nfile_count = 4\n").unwrap();

    let result = common::run_cli_case(
        "config_json_output_is_parseable",
        &[
            "--json",
            "--config",
            config_path.to_str().unwrap(),
            "config",
        ],
    );
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    let parsed: Value = serde_json::from_str(&result.stdout).expect("config JSON");
    assert_eq!(parsed["fixture"]["file_count"], 4);
}

#[test]
fn missing_explicit_config_path_fails() {
    let result = common::run_cli_case(
        "missing_explicit_config_path_fails",
        &["--config", "/nonexistent_fimh/config.toml", "config"],
    );
    assert!(
        !result.status.success(),
        "expected failure; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stderr.contains("FIM-1002"),
        "missing error code; log: {}",
        result.log_path.display()
    );
}

#[test]
fn completions_bash_emits_script() {
    let result = common::run_cli_case("completions_bash_emits_script", &["completions", "bash"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("fimh"),
        "completion script missing command name; log: {}",
        result.log_path.display()
    );
}

#[test]
fn run_with_missing_daemon_binary_fails_with_code() {
    let dir = tempfile::tempdir().unwrap();
    let fixture_dir = dir.path().join("fixture");
    let report = dir.path().join("report.json");
    let jsonl = dir.path().join("run.jsonl");

    let result = common::run_cli_case_env(
        "run_with_missing_daemon_binary_fails_with_code",
        &[
            "--no-color",
            "run",
            "--daemon-bin",
            "/nonexistent_fimh/ficheda",
            "--fixture-dir",
            fixture_dir.to_str().unwrap(),
            "--report",
            report.to_str().unwrap(),
            "--interval",
            "1",
            "--files",
            "3",
            "--deadline",
            "1",
        ],
        &[
            ("FIMH_FIXTURE_BLOCK_LEN_MIN", "10"),
            ("FIMH_FIXTURE_BLOCK_LEN_MAX", "20"),
            ("FIMH_FIXTURE_REPEAT_MIN", "2"),
            ("FIMH_FIXTURE_REPEAT_MAX", "4"),
            ("FIMH_LOG_JSONL_PATH", jsonl.to_str().unwrap()),
        ],
    );
    assert!(
        !result.status.success(),
        "expected failure; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stderr.contains("FIM-3001"),
        "missing error code; log: {}",
        result.log_path.display()
    );
    // Fixture is left in place for postmortem inspection.
    assert!(fixture_dir.join("file_0000.data").exists());
    // The run log captured the failure.
    let log_raw = fs::read_to_string(&jsonl).expect("run log written");
    assert!(log_raw.lines().any(|line| line.contains("\"run_start\"")));
    assert!(log_raw.lines().any(|line| line.contains("FIM-3001")));
}

#[test]
fn run_json_failure_emits_structured_line() {
    let dir = tempfile::tempdir().unwrap();
    let fixture_dir = dir.path().join("fixture");
    let report = dir.path().join("report.json");
    let jsonl = dir.path().join("run.jsonl");

    let result = common::run_cli_case_env(
        "run_json_failure_emits_structured_line",
        &[
            "--json",
            "run",
            "--daemon-bin",
            "/nonexistent_fimh/ficheda",
            "--fixture-dir",
            fixture_dir.to_str().unwrap(),
            "--report",
            report.to_str().unwrap(),
            "--interval",
            "1",
            "--files",
            "3",
            "--deadline",
            "1",
        ],
        &[
            ("FIMH_FIXTURE_BLOCK_LEN_MIN", "10"),
            ("FIMH_FIXTURE_BLOCK_LEN_MAX", "20"),
            ("FIMH_FIXTURE_REPEAT_MIN", "2"),
            ("FIMH_FIXTURE_REPEAT_MAX", "4"),
            ("FIMH_LOG_JSONL_PATH", jsonl.to_str().unwrap()),
        ],
    );
    assert!(!result.status.success());

    let json_line = result
        .stdout
        .lines()
        .find(|line| line.trim_start().starts_with('{'))
        .expect("structured failure line on stdout");
    let parsed: Value = serde_json::from_str(json_line).expect("failure JSON");
    assert_eq!(parsed["ok"], false);
    assert_eq!(parsed["error_code"], "FIM-3001");
}

// ---- full-pipeline scenarios with synthesized daemon reports ----

fn small_fixture(root: &Path) -> FixtureManager {
    let mgr = FixtureManager::new(FixtureConfig {
        dir: root.join("fixture"),
        report_path: root.join("report.json"),
        file_count: 3,
        block_len_min: 10,
        block_len_max: 20,
        repeat_min: 2,
        repeat_max: 4,
    });
    fs::create_dir_all(mgr.dir()).unwrap();
    mgr
}

fn ok_entry(record: &FileRecord) -> ReportEntry {
    ReportEntry {
        path: record.path.clone(),
        status: FileStatus::Ok,
        etalon_crc32: Some(record.baseline_checksum.as_str().to_string()),
        result_crc32: Some(record.baseline_checksum.as_str().to_string()),
    }
}

fn bare_entry(path: &Path, status: FileStatus) -> ReportEntry {
    ReportEntry {
        path: path.to_path_buf(),
        status,
        etalon_crc32: None,
        result_crc32: None,
    }
}

fn model_of(entries: &[ReportEntry]) -> ReportModel {
    let raw = serde_json::to_string(entries).unwrap();
    let snap = Snapshot::parse(&raw, Path::new("/tmp/report.json"), SystemTime::now()).unwrap();
    ReportModel::from_snapshot(&snap)
}

#[test]
fn full_mutation_cycle_validates_phase_by_phase() {
    let tmp = tempfile::tempdir().unwrap();
    let mut fixture = small_fixture(tmp.path());
    let records = fixture.create_baseline_set(3).unwrap();

    // baseline: every file OK with its reference checksum
    let entries: Vec<ReportEntry> = records.iter().map(ok_entry).collect();
    let model = model_of(&entries);
    assert!(validator::check_baseline_perfect(&model, &records).is_empty());

    // add: the copy surfaces as NEW without checksums
    let copy = fixture.add_copy(&records[0].path).unwrap();
    let mut entries: Vec<ReportEntry> = records.iter().map(ok_entry).collect();
    entries.push(bare_entry(&copy, FileStatus::New));
    let model = model_of(&entries);
    assert!(validator::check_entry_count(&model, 4).is_empty());
    assert!(validator::check_added(&model, &copy).is_empty());

    // delete: the original stays reported, as DELETED, also without
    // checksums; the copy is still untracked and stays NEW
    fixture.remove_file(&records[0].path).unwrap();
    let mut entries: Vec<ReportEntry> = records[1..].iter().map(ok_entry).collect();
    entries.push(bare_entry(&copy, FileStatus::New));
    entries.push(bare_entry(&records[0].path, FileStatus::Deleted));
    let model = model_of(&entries);
    assert!(validator::check_entry_count(&model, 4).is_empty());
    assert!(validator::check_deleted(&model, &records[0].path).is_empty());

    // mutate: changed file reported FAIL with old etalon and new result
    let fresh = fixture.mutate_file(&records[1].path).unwrap();
    let changed = ReportEntry {
        path: records[1].path.clone(),
        status: FileStatus::Fail,
        etalon_crc32: Some(records[1].baseline_checksum.as_str().to_string()),
        result_crc32: Some(fresh.as_str().to_string()),
    };
    let model = model_of(&[changed]);
    assert!(
        validator::check_changed(&model, &records[1].path, &records[1].baseline_checksum, &fresh)
            .is_empty()
    );

    // restore: disk content is byte-identical to the baseline again
    fixture.restore().unwrap();
    for record in &records {
        assert_eq!(
            checksum_file(&record.path).unwrap(),
            record.baseline_checksum
        );
    }
    let entries: Vec<ReportEntry> = records.iter().map(ok_entry).collect();
    let model = model_of(&entries);
    assert!(validator::check_baseline_perfect(&model, &records).is_empty());
}

#[test]
fn tampered_report_is_caught_by_baseline_check() {
    let tmp = tempfile::tempdir().unwrap();
    let mut fixture = small_fixture(tmp.path());
    let records = fixture.create_baseline_set(3).unwrap();

    let mut entries: Vec<ReportEntry> = records.iter().map(ok_entry).collect();
    entries[2].result_crc32 = Some("0x00000000".to_string());
    let model = model_of(&entries);

    let mismatches = validator::check_baseline_perfect(&model, &records);
    assert_eq!(mismatches.len(), 1);
    assert!(mismatches[0].expected.contains("result_crc32"));
}

// ---- the whole scenario against a live contract-compliant daemon ----

#[cfg(unix)]
#[test]
fn full_scenario_passes_against_stub_daemon() {
    use fim_harness::core::config::{HarnessConfig, ValidationConfig};
    use fim_harness::logger::jsonl::RunLog;
    use fim_harness::scenario::ScenarioDriver;

    let tmp = tempfile::tempdir().unwrap();
    let config = HarnessConfig {
        daemon: DaemonConfig {
            binary: PathBuf::from(env!("CARGO_BIN_EXE_fimh-stubd")),
            scan_interval_secs: 1,
            start_grace_ms: 300,
            stop_grace_ms: 500,
        },
        fixture: FixtureConfig {
            dir: tmp.path().join("fixture"),
            report_path: tmp.path().join("report.json"),
            file_count: 3,
            block_len_min: 10,
            block_len_max: 20,
            repeat_min: 2,
            repeat_max: 4,
        },
        poll: PollConfig {
            initial_interval_ms: 25,
            max_interval_ms: 100,
            deadline_secs: 10,
        },
        validation: ValidationConfig { fail_fast: true },
        ..HarnessConfig::default()
    };

    let mut driver = ScenarioDriver::new(config, RunLog::disabled());
    let summary = driver.run().expect("scenario against stub daemon");
    assert_eq!(
        summary.phases,
        vec![
            "reset",
            "baseline",
            "add",
            "delete",
            "mutate",
            "restore",
            "final-baseline",
            "shutdown",
        ]
    );
}

#[cfg(unix)]
#[test]
fn rescan_on_unchanged_tree_republishes_the_report() {
    let tmp = tempfile::tempdir().unwrap();
    let fixture_dir = tmp.path().join("fixture");
    let report = tmp.path().join("report.json");
    fs::create_dir_all(&fixture_dir).unwrap();
    fs::write(fixture_dir.join("file_0000.data"), b"steady content").unwrap();

    // Interval far beyond the deadline: only a rescan can refresh the
    // artifact inside this test's window.
    let mut sup = ProcessSupervisor::new(DaemonConfig {
        binary: PathBuf::from(env!("CARGO_BIN_EXE_fimh-stubd")),
        scan_interval_secs: 300,
        start_grace_ms: 300,
        stop_grace_ms: 500,
    });
    sup.start(&fixture_dir, &report).unwrap();

    let poller = SnapshotPoller::new(
        report,
        &PollConfig {
            initial_interval_ms: 25,
            max_interval_ms: 100,
            deadline_secs: 5,
        },
        Duration::from_secs(5),
    );
    let first = poller.wait_for_fresh_snapshot(None).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first.entries()[0].status, FileStatus::Ok);

    // Nothing on disk changed; the rescan alone must yield a fresh snapshot
    // with identical entries.
    sup.signal(DaemonSignal::Rescan).unwrap();
    let second = poller.wait_for_fresh_snapshot(Some(first.mtime())).unwrap();
    assert_ne!(second.mtime(), first.mtime());
    assert_eq!(second.entries(), first.entries());

    sup.stop_with_escalation().unwrap();
}

// ---- supervisor and poller against real processes and files ----

#[cfg(unix)]
#[test]
fn escalation_kills_a_term_ignoring_process() {
    let mut sup = ProcessSupervisor::new(DaemonConfig {
        binary: PathBuf::from("/bin/sh"),
        scan_interval_secs: 1,
        start_grace_ms: 100,
        stop_grace_ms: 300,
    });
    sup.spawn_detached(&["-c".as_ref(), "trap '' TERM; sleep 30".as_ref()])
        .unwrap();
    // Give the shell time to install its trap.
    thread::sleep(Duration::from_millis(300));
    assert!(sup.is_running());

    sup.stop_with_escalation().unwrap();
    assert!(!sup.is_running());
}

#[cfg(unix)]
#[test]
fn rescan_signal_reaches_a_live_child() {
    let mut sup = ProcessSupervisor::new(DaemonConfig {
        binary: PathBuf::from("/bin/sleep"),
        scan_interval_secs: 1,
        start_grace_ms: 50,
        stop_grace_ms: 200,
    });
    sup.spawn_detached(&["30".as_ref()]).unwrap();
    // sleep(1) does not handle SIGUSR1; the delivery itself must not error.
    sup.signal(DaemonSignal::Rescan).unwrap();
    sup.stop_with_escalation().unwrap();
}

#[test]
fn poller_picks_up_a_rewrite_from_another_thread() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("report.json");
    fs::write(&path, "[]").unwrap();
    let first = fs::metadata(&path).unwrap().modified().unwrap();

    let writer_path = path.clone();
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        fs::write(
            &writer_path,
            r#"[{"path": "/f/file_0003.data", "status": "NEW"}]"#,
        )
        .unwrap();
        let future = filetime::FileTime::from_unix_time(
            filetime::FileTime::now().unix_seconds() + 60,
            0,
        );
        filetime::set_file_mtime(&writer_path, future).unwrap();
    });

    let poller = SnapshotPoller::new(
        path,
        &PollConfig {
            initial_interval_ms: 20,
            max_interval_ms: 100,
            deadline_secs: 0,
        },
        Duration::from_secs(5),
    );
    let snap = poller.wait_for_fresh_snapshot(Some(first)).unwrap();
    writer.join().unwrap();

    assert_eq!(snap.len(), 1);
    assert_eq!(snap.entries()[0].status, FileStatus::New);
}
