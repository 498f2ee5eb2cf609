//! Report artifact model: the daemon's JSON output normalized into a
//! path-keyed structure.
//!
//! The artifact is a JSON array of entries. Per the daemon's documented
//! contract, `etalon_crc32` and `result_crc32` are present for OK/FAIL and
//! absent for NEW/DELETED; presence is asserted by the validator, while this
//! module enforces only the *shape* of whatever is present.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{HarnessError, Result};

/// `0x` + 8 uppercase hex digits, exactly.
static CHECKSUM_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9A-F]{8}$").expect("checksum shape regex"));

/// Tracked-file status as reported by the daemon. Exhaustive: any other
/// value in the artifact is a contract violation and fails deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileStatus {
    Ok,
    New,
    Deleted,
    Fail,
}

impl FileStatus {
    /// Wire name, for mismatch reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::New => "NEW",
            Self::Deleted => "DELETED",
            Self::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw report entry, produced exclusively by the external daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub path: PathBuf,
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etalon_crc32: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_crc32: Option<String>,
}

impl ReportEntry {
    /// Validate the shape of any present checksum field.
    fn validate_shape(&self) -> Result<()> {
        for (field, value) in [
            ("etalon_crc32", &self.etalon_crc32),
            ("result_crc32", &self.result_crc32),
        ] {
            if let Some(raw) = value
                && !CHECKSUM_SHAPE.is_match(raw)
            {
                return Err(HarnessError::ContractViolation {
                    path: self.path.clone(),
                    details: format!(
                        "{field} {raw:?} is not '0x' + 8 uppercase hex digits"
                    ),
                });
            }
        }
        Ok(())
    }
}

/// One complete report emitted by the daemon at a point in time: the ordered
/// entry sequence plus the artifact's last-modified stamp at read time.
/// Immutable once read.
#[derive(Debug, Clone)]
pub struct Snapshot {
    entries: Vec<ReportEntry>,
    mtime: SystemTime,
}

impl Snapshot {
    /// Parse the raw artifact text. Any JSON error, unknown status value, or
    /// malformed checksum string is fatal.
    pub fn parse(raw: &str, artifact_path: &Path, mtime: SystemTime) -> Result<Self> {
        let entries: Vec<ReportEntry> =
            serde_json::from_str(raw).map_err(|e| HarnessError::ReportParse {
                path: artifact_path.to_path_buf(),
                details: e.to_string(),
            })?;
        for entry in &entries {
            entry.validate_shape()?;
        }
        Ok(Self { entries, mtime })
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Artifact modification stamp observed when this snapshot was read.
    pub fn mtime(&self) -> SystemTime {
        self.mtime
    }
}

/// Normalized view of one entry, with optionals kept absent rather than a
/// placeholder value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    pub status: FileStatus,
    pub etalon_crc32: Option<String>,
    pub result_crc32: Option<String>,
}

/// Path-keyed view over a snapshot.
#[derive(Debug, Clone)]
pub struct ReportModel {
    by_path: BTreeMap<PathBuf, EntryView>,
    entry_count: usize,
}

impl ReportModel {
    /// Build the path-keyed map. If a path repeats, the later occurrence
    /// wins; daemons may legitimately emit defensive duplicates, so this is
    /// never an error.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut by_path = BTreeMap::new();
        for entry in snapshot.entries() {
            by_path.insert(
                entry.path.clone(),
                EntryView {
                    status: entry.status,
                    etalon_crc32: entry.etalon_crc32.clone(),
                    result_crc32: entry.result_crc32.clone(),
                },
            );
        }
        Self {
            by_path,
            entry_count: snapshot.len(),
        }
    }

    pub fn get(&self, path: &Path) -> Option<&EntryView> {
        self.by_path.get(path)
    }

    /// Number of distinct paths.
    pub fn path_count(&self) -> usize {
        self.by_path.len()
    }

    /// Raw entry count of the underlying snapshot, duplicates included.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.by_path.keys()
    }
}
