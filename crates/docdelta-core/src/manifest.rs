//! Applied-state manifest kept next to the history pool
//!
//! Maps descriptor names to their status and records every backup with the
//! target it was taken from, so neither applied-detection nor undo depend on
//! file names alone.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, IoOperation, Result};
use crate::models::{BackupRecord, DescriptorStatus, ManifestEntry};

/// Manifest file name inside the history directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Persistent descriptor and backup bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Descriptor name -> entry
    #[serde(default)]
    pub descriptors: BTreeMap<String, ManifestEntry>,
    /// Backups in the order they were recorded
    #[serde(default)]
    pub backups: Vec<BackupRecord>,
}

impl Manifest {
    /// Status of `name`; unknown names are pending
    pub fn status(&self, name: &str) -> DescriptorStatus {
        self.descriptors
            .get(name)
            .map(|entry| entry.status)
            .unwrap_or(DescriptorStatus::Pending)
    }

    /// Name of an applied descriptor that had exactly these bytes
    pub fn applied_with_content(&self, content_hash: &str) -> Option<&str> {
        self.descriptors
            .iter()
            .find(|(_, entry)| {
                entry.status == DescriptorStatus::Applied && entry.content_hash == content_hash
            })
            .map(|(name, _)| name.as_str())
    }

    /// Marks `name` applied at `at`
    pub fn mark_applied(&mut self, name: &str, content_hash: &str, at: DateTime<Utc>) {
        self.descriptors.insert(
            name.to_string(),
            ManifestEntry {
                status: DescriptorStatus::Applied,
                applied_at: Some(at),
                content_hash: content_hash.to_string(),
            },
        );
    }

    /// Records a backup; a same-minute backup of the same target replaces the old record
    pub fn record_backup(&mut self, record: BackupRecord) {
        self.backups
            .retain(|r| !(r.backup_file == record.backup_file && r.target == record.target));
        self.backups.push(record);
    }

    /// Most recently recorded entry for a backup file
    pub fn backup_record(&self, backup_file: &str) -> Option<&BackupRecord> {
        self.backups
            .iter()
            .rev()
            .find(|r| r.backup_file == backup_file)
    }
}

/// Reads and writes the manifest file
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    /// Store backed by `{history_dir}/manifest.json`
    pub fn new(history_dir: &Path) -> Self {
        ManifestStore {
            path: history_dir.join(MANIFEST_FILE),
        }
    }

    /// Manifest file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the manifest; an absent file is an empty manifest
    pub fn load(&self) -> Result<Manifest> {
        if !self.path.exists() {
            return Ok(Manifest::default());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| EngineError::io(&self.path, IoOperation::Read, e))?;
        serde_json::from_str(&content).map_err(|e| {
            EngineError::Serialization(format!("{}: {}", self.path.display(), e))
        })
    }

    /// Writes the manifest through a temp file and rename
    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EngineError::io(parent, IoOperation::CreateDir, e))?;
        }
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| EngineError::Serialization(e.to_string()))?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json)
            .map_err(|e| EngineError::io(&temp_path, IoOperation::Write, e))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| EngineError::io(&self.path, IoOperation::Move, e))?;
        debug!(path = %self.path.display(), "manifest saved");
        Ok(())
    }

    /// Load, mutate, save
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Manifest),
    {
        let mut manifest = self.load()?;
        f(&mut manifest);
        self.save(&manifest)
    }
}
