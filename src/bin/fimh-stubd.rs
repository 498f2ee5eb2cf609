#![forbid(unsafe_code)]

//! fimh-stubd: minimal stand-in for the daemon under test.
//!
//! Implements the monitored-directory contract end to end: `-p <dir> -i
//! <interval_secs> -j <report>`, a JSON report of OK/NEW/DELETED/FAIL
//! entries, SIGUSR1 for an out-of-cycle scan, SIGTERM for clean shutdown.
//! Exists so the end-to-end tests have a compliant daemon to drive; it
//! rewrites the report only when the observed state changed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use signal_hook::consts::{SIGTERM, SIGUSR1};

use fim_harness::fixture::checksum::{Checksum, checksum_file};
use fim_harness::report::{FileStatus, ReportEntry};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

struct Args {
    dir: PathBuf,
    interval: Duration,
    report: PathBuf,
}

fn parse_args() -> Option<Args> {
    let mut dir = None;
    let mut interval = None;
    let mut report = None;
    let mut rest = std::env::args().skip(1);
    while let Some(flag) = rest.next() {
        let value = rest.next()?;
        match flag.as_str() {
            "-p" => dir = Some(PathBuf::from(value)),
            "-i" => interval = Some(Duration::from_secs(value.parse().ok()?)),
            "-j" => report = Some(PathBuf::from(value)),
            _ => return None,
        }
    }
    Some(Args {
        dir: dir?,
        interval: interval?,
        report: report?,
    })
}

/// One scan pass. The first scan adopts everything present as the tracked
/// baseline; later scans classify against it. Untracked paths are reported
/// NEW and never adopted.
fn scan(dir: &Path, baseline: &mut BTreeMap<PathBuf, Checksum>) -> Vec<ReportEntry> {
    let mut present: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| entries.flatten().map(|e| e.path()).collect())
        .unwrap_or_default();
    present.sort();

    if baseline.is_empty() {
        for path in &present {
            if let Ok(crc) = checksum_file(path) {
                baseline.insert(path.clone(), crc);
            }
        }
    }

    let mut entries = Vec::new();
    for (path, etalon) in baseline.iter() {
        match checksum_file(path) {
            Ok(result) => {
                let status = if result == *etalon {
                    FileStatus::Ok
                } else {
                    FileStatus::Fail
                };
                entries.push(ReportEntry {
                    path: path.clone(),
                    status,
                    etalon_crc32: Some(etalon.as_str().to_string()),
                    result_crc32: Some(result.as_str().to_string()),
                });
            }
            Err(_) => entries.push(ReportEntry {
                path: path.clone(),
                status: FileStatus::Deleted,
                etalon_crc32: None,
                result_crc32: None,
            }),
        }
    }
    for path in &present {
        if !baseline.contains_key(path) {
            entries.push(ReportEntry {
                path: path.clone(),
                status: FileStatus::New,
                etalon_crc32: None,
                result_crc32: None,
            });
        }
    }
    entries
}

fn main() {
    let Some(args) = parse_args() else {
        eprintln!("usage: fimh-stubd -p <dir> -i <interval_secs> -j <report>");
        exit(2);
    };

    let term = Arc::new(AtomicBool::new(false));
    let rescan = Arc::new(AtomicBool::new(false));
    for (sig, flag) in [(SIGTERM, &term), (SIGUSR1, &rescan)] {
        if let Err(e) = signal_hook::flag::register(sig, Arc::clone(flag)) {
            eprintln!("fimh-stubd: cannot register signal {sig}: {e}");
            exit(2);
        }
    }

    let mut baseline = BTreeMap::new();
    let mut last_written: Option<String> = None;
    // A requested rescan must republish even an unchanged report: the
    // rewrite itself (and its fresh mtime) is the observable answer.
    let mut force_publish = false;
    while !term.load(Ordering::Relaxed) {
        let entries = scan(&args.dir, &mut baseline);
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => {
                if force_publish || last_written.as_ref() != Some(&json) {
                    // Write-then-rename so a reader never sees a partial
                    // report.
                    let staging = args.report.with_extension("tmp");
                    let published = fs::write(&staging, &json)
                        .and_then(|()| fs::rename(&staging, &args.report));
                    match published {
                        Ok(()) => last_written = Some(json),
                        Err(e) => eprintln!(
                            "fimh-stubd: cannot publish {}: {e}",
                            args.report.display()
                        ),
                    }
                }
            }
            Err(e) => eprintln!("fimh-stubd: serialize failure: {e}"),
        }
        force_publish = false;

        let mut waited = Duration::ZERO;
        while waited < args.interval && !term.load(Ordering::Relaxed) {
            if rescan.swap(false, Ordering::Relaxed) {
                force_publish = true;
                break;
            }
            thread::sleep(SLEEP_SLICE);
            waited += SLEEP_SLICE;
        }
    }
}
