//! Pre-mutation backups stored flat as `{basename}.{YYYYMMDDHHMM}`

use crate::error::{EngineError, IoOperation, Result};
use crate::manifest::Manifest;
use crate::models::BackupRecord;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Timestamp format appended to backup file names
pub const STAMP_FORMAT: &str = "%Y%m%d%H%M";
const STAMP_LEN: usize = 12;

/// Manages backup creation and lookup
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
}

impl BackupManager {
    /// Creates a new BackupManager instance
    ///
    /// # Arguments
    ///
    /// * `backup_dir` - Directory where backups will be stored
    pub fn new(backup_dir: PathBuf) -> Self {
        BackupManager { backup_dir }
    }

    /// Directory holding the backups
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Location of a backup file
    pub fn path_of(&self, record: &BackupRecord) -> PathBuf {
        self.backup_dir.join(&record.backup_file)
    }

    /// Copies the current bytes of `source` into the backup directory
    ///
    /// # Arguments
    ///
    /// * `target` - Target path relative to the docs root, recorded for undo
    /// * `source` - Actual file to copy
    ///
    /// Two backups of the same file within one minute share a name; the
    /// later one overwrites the earlier.
    pub fn create_backup(&self, target: &str, source: &Path) -> Result<BackupRecord> {
        self.create_backup_at(target, source, Utc::now())
    }

    /// [`create_backup`](Self::create_backup) with an explicit clock
    pub fn create_backup_at(
        &self,
        target: &str,
        source: &Path,
        now: DateTime<Utc>,
    ) -> Result<BackupRecord> {
        fs::create_dir_all(&self.backup_dir)
            .map_err(|e| EngineError::io(&self.backup_dir, IoOperation::CreateDir, e))?;

        let basename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                EngineError::io(
                    source,
                    IoOperation::Copy,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "target has no file name"),
                )
            })?;
        let stamp = now.format(STAMP_FORMAT).to_string();
        let backup_file = format!("{}.{}", basename, stamp);
        let backup_path = self.backup_dir.join(&backup_file);

        fs::copy(source, &backup_path)
            .map_err(|e| EngineError::io(&backup_path, IoOperation::Copy, e))?;

        info!(target = %target, backup = %backup_file, "backup created");
        Ok(BackupRecord {
            target: target.to_string(),
            backup_file,
            stamp,
            recorded_at: Some(now),
        })
    }

    /// Every backup on disk, newest first
    ///
    /// Targets come from the manifest when it knows the file; otherwise the
    /// original name is recovered from the file name itself.
    pub fn list(&self, manifest: &Manifest) -> Result<Vec<BackupRecord>> {
        if !self.backup_dir.is_dir() {
            debug!("backup directory does not exist, no backups");
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.backup_dir)
            .map_err(|e| EngineError::io(&self.backup_dir, IoOperation::List, e))?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::io(&self.backup_dir, IoOperation::List, e))?;
            if !entry.path().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some((original, stamp)) = parse_backup_name(&file_name) else {
                continue;
            };

            let record = match manifest.backup_record(&file_name) {
                Some(known) => known.clone(),
                None => BackupRecord {
                    target: original.to_string(),
                    backup_file: file_name.clone(),
                    stamp: stamp.to_string(),
                    recorded_at: None,
                },
            };
            records.push(record);
        }

        records.sort_by(|a, b| {
            (&b.stamp, b.recorded_at, &b.backup_file).cmp(&(&a.stamp, a.recorded_at, &a.backup_file))
        });
        Ok(records)
    }

    /// Backups of one target, newest first
    pub fn history(&self, target: &str, manifest: &Manifest) -> Result<Vec<BackupRecord>> {
        Ok(self
            .list(manifest)?
            .into_iter()
            .filter(|r| r.target == target)
            .collect())
    }
}

/// Splits `{original}.{YYYYMMDDHHMM}` into its original name and stamp
///
/// Only the final dot-separated segment is treated as the stamp, so names
/// that themselves contain dots (`CHANGELOG.md`) survive the round trip.
pub fn parse_backup_name(file_name: &str) -> Option<(&str, &str)> {
    let (original, stamp) = file_name.rsplit_once('.')?;
    if original.is_empty()
        || stamp.len() != STAMP_LEN
        || !stamp.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    Some((original, stamp))
}
