//! Restores targets from their backups

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{info, warn};

use crate::backup::BackupManager;
use crate::error::{EngineError, IoOperation, Result};
use crate::manifest::{Manifest, ManifestStore};
use crate::models::{BackupRecord, UndoReport};
use crate::verifier::ContentVerifier;

/// Restores backed-up bytes over targets in the documentation tree
///
/// There is one level of undo: a restore is not itself backed up, so there
/// is no redo.
#[derive(Debug, Clone)]
pub struct UndoManager {
    docs_root: PathBuf,
    backups: BackupManager,
    manifest: ManifestStore,
    verifier: ContentVerifier,
}

impl UndoManager {
    /// Undo over `backups`, restoring into `docs_root`
    pub fn new(docs_root: PathBuf, backups: BackupManager, manifest: ManifestStore) -> Self {
        UndoManager {
            docs_root,
            backups,
            manifest,
            verifier: ContentVerifier::new(),
        }
    }

    /// The newest backup across all targets
    pub fn latest(&self) -> Result<BackupRecord> {
        self.backups
            .list(&self.manifest())?
            .into_iter()
            .next()
            .ok_or(EngineError::NoBackups)
    }

    /// Restores the newest backup over its target
    pub fn undo(&self) -> Result<UndoReport> {
        let record = self.latest()?;
        self.restore_record(&record)
    }

    /// Restores generation `generation` (0 = newest) of `target`
    pub fn restore(&self, target: &str, generation: usize) -> Result<UndoReport> {
        let all = self.backups.list(&self.manifest())?;
        if all.is_empty() {
            return Err(EngineError::NoBackups);
        }
        let record = all
            .iter()
            .filter(|r| r.target == target)
            .nth(generation)
            .ok_or_else(|| EngineError::BackupNotFound {
                target: target.to_string(),
                generation,
            })?;
        self.restore_record(record)
    }

    fn restore_record(&self, record: &BackupRecord) -> Result<UndoReport> {
        let backup_path = self.backups.path_of(record);
        let restored_path = self.target_path(&record.target)?;

        if let Some(parent) = restored_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EngineError::io(parent, IoOperation::CreateDir, e))?;
        }
        fs::copy(&backup_path, &restored_path)
            .map_err(|e| EngineError::io(&restored_path, IoOperation::Copy, e))?;
        self.verifier.verify_copy(&backup_path, &restored_path)?;

        info!(
            target = %record.target,
            backup = %record.backup_file,
            "target restored from backup"
        );
        Ok(UndoReport {
            target: record.target.clone(),
            backup_file: record.backup_file.clone(),
            restored_path,
            audit_warning: None,
        })
    }

    fn target_path(&self, target: &str) -> Result<PathBuf> {
        let relative = Path::new(target);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir));
        if escapes {
            return Err(EngineError::validation(
                target,
                "backup target lies outside the docs root",
            ));
        }
        Ok(self.docs_root.join(relative))
    }

    fn manifest(&self) -> Manifest {
        self.manifest.load().unwrap_or_else(|e| {
            warn!("ignoring unreadable manifest: {}", e);
            Manifest::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        docs: PathBuf,
        backups: BackupManager,
        manifest: ManifestStore,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        let backups = BackupManager::new(temp.path().join("backups"));
        let manifest = ManifestStore::new(&docs.join("yaml-history"));
        Fixture {
            _temp: temp,
            docs,
            backups,
            manifest,
        }
    }

    impl Fixture {
        fn undo(&self) -> UndoManager {
            UndoManager::new(self.docs.clone(), self.backups.clone(), self.manifest.clone())
        }

        fn backup(&self, target: &str, content: &str, minute: u32) {
            let path = self.docs.join(target);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            let now = Utc.with_ymd_and_hms(2026, 10, 19, 9, minute, 0).unwrap();
            let record = self.backups.create_backup_at(target, &path, now).unwrap();
            self.manifest.update(|m| m.record_backup(record)).unwrap();
        }
    }

    #[test]
    fn test_undo_without_backups() {
        let fx = fixture();
        assert!(matches!(fx.undo().undo(), Err(EngineError::NoBackups)));
    }

    #[test]
    fn test_undo_restores_most_recent_backup() {
        let fx = fixture();
        fx.backup("README.md", "readme v1", 1);
        fx.backup("CHANGELOG.md", "changelog v1", 2);
        fs::write(fx.docs.join("CHANGELOG.md"), "changelog v2").unwrap();

        let report = fx.undo().undo().unwrap();
        assert_eq!(report.target, "CHANGELOG.md");
        assert_eq!(
            fs::read_to_string(fx.docs.join("CHANGELOG.md")).unwrap(),
            "changelog v1"
        );
    }

    #[test]
    fn test_restore_nested_target_by_generation() {
        let fx = fixture();
        fx.backup("guides/setup.md", "gen one", 1);
        fx.backup("guides/setup.md", "gen two", 2);
        fs::write(fx.docs.join("guides/setup.md"), "current").unwrap();

        let undo = fx.undo();
        undo.restore("guides/setup.md", 1).unwrap();
        assert_eq!(
            fs::read_to_string(fx.docs.join("guides/setup.md")).unwrap(),
            "gen one"
        );
        undo.restore("guides/setup.md", 0).unwrap();
        assert_eq!(
            fs::read_to_string(fx.docs.join("guides/setup.md")).unwrap(),
            "gen two"
        );
        assert!(matches!(
            undo.restore("guides/setup.md", 2),
            Err(EngineError::BackupNotFound { generation: 2, .. })
        ));
    }

    #[test]
    fn test_unrecorded_backup_recovers_name_with_dots() {
        let fx = fixture();
        let backup_dir = fx.backups.backup_dir().to_path_buf();
        fs::create_dir_all(&backup_dir).unwrap();
        fs::write(backup_dir.join("CHANGELOG.md.202610190900"), "from disk").unwrap();

        let report = fx.undo().undo().unwrap();
        assert_eq!(report.target, "CHANGELOG.md");
        assert_eq!(
            fs::read_to_string(fx.docs.join("CHANGELOG.md")).unwrap(),
            "from disk"
        );
    }
}
