//! Structured assertions over a report model.
//!
//! Each check is a pure function from (model, expected state) to a list of
//! mismatches; the driver turns a non-empty list into a fatal
//! `AssertionFailed` carrying a readable expected-vs-observed report. In
//! fail-fast mode only the first mismatch of a phase is reported; otherwise
//! every mismatch in the phase is listed.

#![allow(missing_docs)]

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::errors::{HarnessError, Result};
use crate::fixture::FileRecord;
use crate::fixture::checksum::Checksum;
use crate::report::{FileStatus, ReportModel};

/// One violated expectation, rendered as expected-vs-observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub path: Option<PathBuf>,
    pub expected: String,
    pub observed: String,
}

impl Mismatch {
    fn new(path: Option<&Path>, expected: impl Into<String>, observed: impl Into<String>) -> Self {
        Self {
            path: path.map(Path::to_path_buf),
            expected: expected.into(),
            observed: observed.into(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(
                f,
                "{}: expected {}, observed {}",
                path.display(),
                self.expected,
                self.observed
            ),
            None => write!(f, "expected {}, observed {}", self.expected, self.observed),
        }
    }
}

/// Convert collected mismatches into the phase verdict. `Ok(())` when the
/// list is empty; otherwise an `AssertionFailed` listing one mismatch
/// (fail-fast) or all of them.
pub fn into_verdict(phase: &str, mismatches: Vec<Mismatch>, fail_fast: bool) -> Result<()> {
    if mismatches.is_empty() {
        return Ok(());
    }
    let shown: Vec<String> = if fail_fast {
        mismatches.iter().take(1).map(Mismatch::to_string).collect()
    } else {
        mismatches.iter().map(Mismatch::to_string).collect()
    };
    let mut report = shown.join("\n");
    if fail_fast && mismatches.len() > 1 {
        report.push_str(&format!("\n({} further checks skipped)", mismatches.len() - 1));
    }
    Err(HarnessError::AssertionFailed {
        phase: phase.to_string(),
        report,
    })
}

/// Snapshot entry count must equal the count of currently-expected tracked
/// paths, with no silent loss or duplication.
#[must_use]
pub fn check_entry_count(model: &ReportModel, expected: usize) -> Vec<Mismatch> {
    if model.entry_count() == expected {
        Vec::new()
    } else {
        vec![Mismatch::new(
            None,
            format!("{expected} report entries"),
            format!("{} entries", model.entry_count()),
        )]
    }
}

/// Every expected path present with status OK and both checksums equal to
/// its baseline; entry count equal to the expected path count.
#[must_use]
pub fn check_baseline_perfect(model: &ReportModel, expected: &[FileRecord]) -> Vec<Mismatch> {
    let mut mismatches = check_entry_count(model, expected.len());

    for record in expected {
        let Some(view) = model.get(&record.path) else {
            mismatches.push(Mismatch::new(
                Some(&record.path),
                "an entry for this path",
                "no entry",
            ));
            continue;
        };
        if view.status != FileStatus::Ok {
            mismatches.push(Mismatch::new(
                Some(&record.path),
                "status OK",
                format!("status {}", view.status),
            ));
            continue;
        }
        mismatches.extend(check_checksum_field(
            &record.path,
            "etalon_crc32",
            view.etalon_crc32.as_deref(),
            &record.baseline_checksum,
        ));
        mismatches.extend(check_checksum_field(
            &record.path,
            "result_crc32",
            view.result_crc32.as_deref(),
            &record.baseline_checksum,
        ));
    }
    mismatches
}

/// Newly created path present with status NEW and both checksum fields
/// absent.
#[must_use]
pub fn check_added(model: &ReportModel, new_path: &Path) -> Vec<Mismatch> {
    check_untracked(model, new_path, FileStatus::New)
}

/// Removed path still present with status DELETED and both checksum fields
/// absent.
#[must_use]
pub fn check_deleted(model: &ReportModel, removed_path: &Path) -> Vec<Mismatch> {
    check_untracked(model, removed_path, FileStatus::Deleted)
}

/// Changed path present with status FAIL, etalon equal to the last
/// known-good checksum, result equal to the fresh content's checksum, and
/// the two different.
#[must_use]
pub fn check_changed(
    model: &ReportModel,
    changed_path: &Path,
    baseline: &Checksum,
    fresh: &Checksum,
) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    if baseline == fresh {
        // Degenerate expectation; the daemon would rightly report OK.
        mismatches.push(Mismatch::new(
            Some(changed_path),
            "baseline and fresh checksums to differ",
            format!("both are {baseline}"),
        ));
        return mismatches;
    }

    let Some(view) = model.get(changed_path) else {
        return vec![Mismatch::new(
            Some(changed_path),
            "an entry for this path",
            "no entry",
        )];
    };
    if view.status != FileStatus::Fail {
        mismatches.push(Mismatch::new(
            Some(changed_path),
            "status FAIL",
            format!("status {}", view.status),
        ));
        return mismatches;
    }
    mismatches.extend(check_checksum_field(
        changed_path,
        "etalon_crc32",
        view.etalon_crc32.as_deref(),
        baseline,
    ));
    mismatches.extend(check_checksum_field(
        changed_path,
        "result_crc32",
        view.result_crc32.as_deref(),
        fresh,
    ));
    mismatches
}

/// Shared NEW/DELETED shape: present, expected status, both checksums
/// absent (documented daemon behavior for untracked transitions).
fn check_untracked(model: &ReportModel, path: &Path, status: FileStatus) -> Vec<Mismatch> {
    let Some(view) = model.get(path) else {
        return vec![Mismatch::new(
            Some(path),
            "an entry for this path",
            "no entry",
        )];
    };
    let mut mismatches = Vec::new();
    if view.status != status {
        mismatches.push(Mismatch::new(
            Some(path),
            format!("status {status}"),
            format!("status {}", view.status),
        ));
        return mismatches;
    }
    for (field, value) in [
        ("etalon_crc32", &view.etalon_crc32),
        ("result_crc32", &view.result_crc32),
    ] {
        if let Some(present) = value {
            mismatches.push(Mismatch::new(
                Some(path),
                format!("{field} absent"),
                format!("{field} = {present}"),
            ));
        }
    }
    mismatches
}

fn check_checksum_field(
    path: &Path,
    field: &str,
    observed: Option<&str>,
    expected: &Checksum,
) -> Vec<Mismatch> {
    match observed {
        Some(value) if expected == value => Vec::new(),
        Some(value) => vec![Mismatch::new(
            Some(path),
            format!("{field} = {expected}"),
            format!("{field} = {value}"),
        )],
        None => vec![Mismatch::new(
            Some(path),
            format!("{field} = {expected}"),
            format!("{field} absent"),
        )],
    }
}
