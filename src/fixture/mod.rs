//! Fixture manager: creates, mutates, and restores the on-disk file set used
//! as test input.
//!
//! Baseline files are named `file_NNNN.data` and filled with one random
//! alphanumeric block (1000–9999 chars by default) repeated 1000–9999 times,
//! written block-by-block so a multi-megabyte fixture never has to sit fully
//! in memory. Side files created during the scenario (the add-phase copy and
//! the mutate-phase backup) take the next free indexes after the baseline set
//! and are moved back over the originals by `restore()`.

#![allow(missing_docs)]

pub mod checksum;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::core::config::FixtureConfig;
use crate::core::errors::{HarnessError, Result};
use crate::core::paths::resolve_absolute_path;
use crate::fixture::checksum::{Checksum, checksum_file};
use crate::supervisor::ProcessSupervisor;

/// One tracked fixture file and the checksum treated as ground truth for it.
///
/// `baseline_checksum` is never silently recomputed; it changes only when the
/// harness deliberately redefines what "correct" means for the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub baseline_checksum: Checksum,
}

/// Owns the fixture directory, the report artifact path, and the side-file
/// bookkeeping needed to reverse mutations.
pub struct FixtureManager {
    dir: PathBuf,
    report_path: PathBuf,
    config: FixtureConfig,
    next_side_index: usize,
    /// Add-phase copy: (copy path, source it was copied from).
    add_copy: Option<(PathBuf, PathBuf)>,
    /// Mutate-phase backup: (backup path, original it preserves).
    mutate_backup: Option<(PathBuf, PathBuf)>,
}

impl FixtureManager {
    /// Create a manager for the configured fixture layout. Paths are
    /// normalized to absolute form because the daemon reports absolute paths.
    #[must_use]
    pub fn new(config: FixtureConfig) -> Self {
        let dir = resolve_absolute_path(&config.dir);
        let report_path = resolve_absolute_path(&config.report_path);
        let next_side_index = config.file_count + 1;
        Self {
            dir,
            report_path,
            config,
            next_side_index,
            add_copy: None,
            mutate_backup: None,
        }
    }

    /// Fixture directory (absolute).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Report artifact path (absolute).
    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    /// Remove the fixture directory and any prior report artifact, then
    /// recreate an empty directory.
    ///
    /// Requires that no daemon instance is running; a stale daemon would
    /// rewrite the report artifact over the fresh scenario's state.
    pub fn reset(&mut self, supervisor: &ProcessSupervisor) -> Result<()> {
        if let Some(pid) = supervisor.discover_existing()? {
            return Err(HarnessError::FixtureState {
                details: format!(
                    "daemon '{}' already running as pid {pid}; stop it before reset",
                    supervisor.daemon_name()
                ),
            });
        }

        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(HarnessError::io(&self.dir, e)),
        }
        match fs::remove_file(&self.report_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(HarnessError::io(&self.report_path, e)),
        }
        fs::create_dir_all(&self.dir).map_err(|e| HarnessError::io(&self.dir, e))?;

        self.next_side_index = self.config.file_count + 1;
        self.add_copy = None;
        self.mutate_backup = None;
        Ok(())
    }

    /// Create `n` baseline files with randomized content and record their
    /// reference checksums.
    pub fn create_baseline_set(&mut self, n: usize) -> Result<Vec<FileRecord>> {
        let mut records = Vec::with_capacity(n);
        for index in 0..n {
            let path = self.file_path(index);
            self.fill_random(&path)?;
            let baseline_checksum = checksum_file(&path)?;
            records.push(FileRecord {
                path,
                baseline_checksum,
            });
        }
        self.next_side_index = n + 1;
        Ok(records)
    }

    /// Duplicate an existing file's bytes under the next free side index.
    ///
    /// No `FileRecord` is registered; the new path is expected to surface in
    /// the daemon's next report as NEW.
    pub fn add_copy(&mut self, source: &Path) -> Result<PathBuf> {
        let target = self.file_path(self.next_side_index);
        self.next_side_index += 1;
        fs::copy(source, &target).map_err(|e| HarnessError::io(&target, e))?;
        self.add_copy = Some((target.clone(), source.to_path_buf()));
        Ok(target)
    }

    /// Delete the underlying file. The corresponding `FileRecord` stays in
    /// scenario state as expected-but-removed.
    pub fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| HarnessError::io(path, e))
    }

    /// Preserve a backup copy under a side path, then overwrite the original
    /// with fresh randomized content. Returns the recomputed checksum of the
    /// new content; the path's baseline checksum is left untouched.
    pub fn mutate_file(&mut self, path: &Path) -> Result<Checksum> {
        let backup = self.file_path(self.next_side_index);
        self.next_side_index += 1;
        fs::copy(path, &backup).map_err(|e| HarnessError::io(&backup, e))?;
        self.mutate_backup = Some((backup, path.to_path_buf()));

        self.fill_random(path)?;
        checksum_file(path)
    }

    /// Move the add-phase copy back onto the removed original's name and the
    /// mutate-phase backup back onto the changed original's name, returning
    /// the tree to exactly the baseline content.
    pub fn restore(&mut self) -> Result<()> {
        let (copy, copy_source) = self.add_copy.take().ok_or_else(|| {
            HarnessError::FixtureState {
                details: "restore() without a prior add_copy()".to_string(),
            }
        })?;
        let (backup, mutated) = self.mutate_backup.take().ok_or_else(|| {
            HarnessError::FixtureState {
                details: "restore() without a prior mutate_file()".to_string(),
            }
        })?;

        fs::rename(&copy, &copy_source).map_err(|e| HarnessError::io(&copy, e))?;
        fs::rename(&backup, &mutated).map_err(|e| HarnessError::io(&backup, e))?;
        Ok(())
    }

    /// Plain listing of the fixture directory for operator diagnostics.
    pub fn list_dir(&self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| HarnessError::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| HarnessError::io(&self.dir, e))?;
            let meta = entry.metadata().map_err(|e| HarnessError::io(entry.path(), e))?;
            lines.push(format!(
                "{:>12}  {}",
                meta.len(),
                entry.file_name().to_string_lossy()
            ));
        }
        lines.sort();
        Ok(lines)
    }

    /// `file_NNNN.data` path inside the fixture directory.
    fn file_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("file_{index:04}.data"))
    }

    /// Fill a file with a random alphanumeric block repeated a random number
    /// of times, block-by-block.
    fn fill_random(&self, path: &Path) -> Result<()> {
        let mut rng = rand::rng();
        let block_len = rng.random_range(self.config.block_len_min..=self.config.block_len_max);
        let repeats = rng.random_range(self.config.repeat_min..=self.config.repeat_max);
        let block: Vec<u8> = (&mut rng)
            .sample_iter(Alphanumeric)
            .take(block_len)
            .collect();

        let file = File::create(path).map_err(|e| HarnessError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        for _ in 0..repeats {
            writer
                .write_all(&block)
                .map_err(|e| HarnessError::io(path, e))?;
        }
        writer.flush().map_err(|e| HarnessError::io(path, e))?;
        Ok(())
    }
}
