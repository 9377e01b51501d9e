//! Appends descriptor changes to their target files

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::backup::BackupManager;
use crate::error::{EngineError, IoOperation, Result};
use crate::manifest::ManifestStore;
use crate::models::{
    marker_line, ApplyWarning, BackupRecord, TargetAction, TargetReport, UpdateDescriptor,
};

/// Per-target results of one applier pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedChanges {
    /// Outcome for each target, in descriptor order
    pub targets: Vec<TargetReport>,
    /// Backups taken along the way
    pub backups: Vec<BackupRecord>,
    /// Skipped targets and similar
    pub warnings: Vec<ApplyWarning>,
}

impl AppliedChanges {
    /// Targets whose bytes were changed
    pub fn mutated(&self) -> Vec<String> {
        self.targets
            .iter()
            .filter(|t| matches!(t.action, TargetAction::Appended { .. }))
            .map(|t| t.target.clone())
            .collect()
    }
}

/// Applies a validated descriptor to the documentation tree
///
/// Missing targets are never created: they are skipped and reported as
/// [`ApplyWarning::MissingTarget`]. A target that exists but is not a regular
/// file fails in dry runs and real runs alike. There is no rollback; when a
/// target fails after earlier ones were appended the error is
/// [`EngineError::PartiallyApplied`].
#[derive(Debug, Clone)]
pub struct ChangeApplier {
    docs_root: PathBuf,
    backups: Option<BackupManager>,
    manifest: Option<ManifestStore>,
}

impl ChangeApplier {
    /// Applier rooted at `docs_root`; `backups` is `None` when backups are disabled
    pub fn new(docs_root: PathBuf, backups: Option<BackupManager>) -> Self {
        ChangeApplier {
            docs_root,
            backups,
            manifest: None,
        }
    }

    /// Records every backup in `manifest` as soon as it is taken
    pub fn with_manifest(mut self, manifest: ManifestStore) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Walks `updated_files` in order; with `dry_run` nothing is touched
    pub fn apply(&self, descriptor: &UpdateDescriptor, dry_run: bool) -> Result<AppliedChanges> {
        let mut applied = AppliedChanges::default();

        for target in &descriptor.updated_files {
            if let Err(e) = self.apply_target(descriptor, target, dry_run, &mut applied) {
                let completed = applied.mutated();
                if completed.is_empty() {
                    return Err(e);
                }
                warn!(
                    descriptor = %descriptor.name,
                    failed = %target,
                    completed = completed.len(),
                    "descriptor partially applied"
                );
                return Err(EngineError::PartiallyApplied {
                    descriptor: descriptor.name.clone(),
                    completed,
                    failed_stage: target.clone(),
                    source: Box::new(e),
                });
            }
        }
        Ok(applied)
    }

    fn apply_target(
        &self,
        descriptor: &UpdateDescriptor,
        target: &str,
        dry_run: bool,
        applied: &mut AppliedChanges,
    ) -> Result<()> {
        let path = self.docs_root.join(target);
        let changes = descriptor.changes_for(target);

        if !path.exists() {
            warn!(descriptor = %descriptor.name, target = %target, "target missing, skipped");
            applied.targets.push(TargetReport {
                target: target.to_string(),
                action: TargetAction::SkippedMissing,
                backup: None,
            });
            applied.warnings.push(ApplyWarning::MissingTarget {
                target: target.to_string(),
            });
            return Ok(());
        }
        if !path.is_file() {
            return Err(EngineError::validation(
                &descriptor.name,
                format!("target '{}' is not a regular file", target),
            ));
        }

        let action = if changes.is_empty() {
            TargetAction::Unchanged
        } else {
            TargetAction::Appended {
                changes: changes.len(),
            }
        };

        if dry_run {
            debug!(target = %target, ?action, "dry run");
            applied.targets.push(TargetReport {
                target: target.to_string(),
                action,
                backup: None,
            });
            return Ok(());
        }

        let backup = match &self.backups {
            Some(manager) => {
                let record = manager.create_backup(target, &path)?;
                let name = record.backup_file.clone();
                self.record_backup(&record, applied);
                applied.backups.push(record);
                Some(name)
            }
            None => None,
        };

        if !changes.is_empty() {
            append_changes(&path, changes)?;
            info!(target = %target, changes = changes.len(), "changes appended");
        }

        applied.targets.push(TargetReport {
            target: target.to_string(),
            action,
            backup,
        });
        Ok(())
    }

    fn record_backup(&self, record: &BackupRecord, applied: &mut AppliedChanges) {
        let Some(store) = &self.manifest else {
            return;
        };
        if let Err(e) = store.update(|m| m.record_backup(record.clone())) {
            warn!(backup = %record.backup_file, "backup not recorded in manifest: {}", e);
            applied.warnings.push(ApplyWarning::Manifest {
                message: e.to_string(),
            });
        }
    }
}

fn append_changes(path: &Path, changes: &[String]) -> Result<()> {
    let block: String = changes.iter().map(|c| marker_line(c)).collect();
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| EngineError::io(path, IoOperation::Append, e))?;
    file.write_all(block.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| EngineError::io(path, IoOperation::Append, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn descriptor(targets: &[&str], changes: &[(&str, &[&str])]) -> UpdateDescriptor {
        UpdateDescriptor {
            name: "test.yaml".to_string(),
            content_hash: String::new(),
            updated_files: targets.iter().map(|t| t.to_string()).collect(),
            changes: changes
                .iter()
                .map(|(t, c)| (t.to_string(), c.iter().map(|s| s.to_string()).collect()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_appends_markers_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path();
        fs::write(docs.join("a.md"), "# A\n").unwrap();

        let applier = ChangeApplier::new(docs.to_path_buf(), None);
        let result = applier
            .apply(&descriptor(&["a.md"], &[("a.md", &["c1", "c2"])]), false)
            .unwrap();

        let content = fs::read_to_string(docs.join("a.md")).unwrap();
        assert_eq!(
            content,
            "# A\n\n<!-- Update: c1 -->\n\n<!-- Update: c2 -->\n"
        );
        assert_eq!(result.mutated(), vec!["a.md"]);
        assert!(result.backups.is_empty());
    }

    #[test]
    fn test_missing_target_is_skipped_not_created() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path();
        let applier = ChangeApplier::new(
            docs.to_path_buf(),
            Some(BackupManager::new(docs.join("backups"))),
        );
        let result = applier
            .apply(&descriptor(&["ghost.md"], &[("ghost.md", &["boo"])]), false)
            .unwrap();

        assert!(!docs.join("ghost.md").exists());
        assert!(!docs.join("backups").exists());
        assert_eq!(result.targets[0].action, TargetAction::SkippedMissing);
        assert_eq!(
            result.warnings,
            vec![ApplyWarning::MissingTarget {
                target: "ghost.md".to_string()
            }]
        );
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path();
        fs::write(docs.join("a.md"), "unchanged").unwrap();
        let applier = ChangeApplier::new(
            docs.to_path_buf(),
            Some(BackupManager::new(docs.join("backups"))),
        );

        let result = applier
            .apply(&descriptor(&["a.md"], &[("a.md", &["x"])]), true)
            .unwrap();

        assert_eq!(fs::read_to_string(docs.join("a.md")).unwrap(), "unchanged");
        assert!(!docs.join("backups").exists());
        assert_eq!(result.targets[0].action, TargetAction::Appended { changes: 1 });
    }

    #[test]
    fn test_backup_taken_before_append() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path();
        fs::write(docs.join("a.md"), "before").unwrap();
        let manager = BackupManager::new(docs.join("backups"));
        let applier = ChangeApplier::new(docs.to_path_buf(), Some(manager.clone()));

        let result = applier
            .apply(&descriptor(&["a.md"], &[("a.md", &["x"])]), false)
            .unwrap();

        assert_eq!(result.backups.len(), 1);
        let backup = fs::read_to_string(manager.path_of(&result.backups[0])).unwrap();
        assert_eq!(backup, "before");
        assert_eq!(result.targets[0].backup.as_deref(), Some(result.backups[0].backup_file.as_str()));
    }

    #[test]
    fn test_failure_after_mutation_is_partial() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path();
        fs::write(docs.join("a.md"), "a").unwrap();
        // a directory cannot be opened for append
        fs::create_dir_all(docs.join("b.md")).unwrap();

        let applier = ChangeApplier::new(docs.to_path_buf(), None);
        let err = applier
            .apply(
                &descriptor(&["a.md", "b.md"], &[("a.md", &["x"]), ("b.md", &["y"])]),
                false,
            )
            .unwrap_err();

        match err {
            EngineError::PartiallyApplied {
                completed,
                failed_stage,
                ..
            } => {
                assert_eq!(completed, vec!["a.md"]);
                assert_eq!(failed_stage, "b.md");
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_on_first_target_is_not_partial() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path();
        fs::create_dir_all(docs.join("dir.md")).unwrap();

        let applier = ChangeApplier::new(docs.to_path_buf(), None);
        let err = applier
            .apply(&descriptor(&["dir.md"], &[("dir.md", &["x"])]), false)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn test_dry_run_rejects_directory_target() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path();
        fs::write(docs.join("a.md"), "a").unwrap();
        fs::create_dir_all(docs.join("dir.md")).unwrap();

        let applier = ChangeApplier::new(docs.to_path_buf(), None);
        let err = applier
            .apply(
                &descriptor(&["a.md", "dir.md"], &[("a.md", &["x"]), ("dir.md", &["y"])]),
                true,
            )
            .unwrap_err();
        // nothing was mutated, so the dry run fails outright
        assert!(matches!(err, EngineError::Validation { .. }));
        assert_eq!(fs::read_to_string(docs.join("a.md")).unwrap(), "a");
    }

    #[test]
    fn test_backups_recorded_before_later_failure() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path();
        fs::create_dir_all(docs.join("guides")).unwrap();
        fs::write(docs.join("guides/setup.md"), "setup").unwrap();
        fs::create_dir_all(docs.join("broken.md")).unwrap();
        let store = ManifestStore::new(&docs.join("yaml-history"));

        let applier = ChangeApplier::new(
            docs.to_path_buf(),
            Some(BackupManager::new(docs.join("backups"))),
        )
        .with_manifest(store.clone());
        let err = applier
            .apply(
                &descriptor(
                    &["guides/setup.md", "broken.md"],
                    &[("guides/setup.md", &["x"]), ("broken.md", &["y"])],
                ),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::PartiallyApplied { .. }));

        let manifest = store.load().unwrap();
        assert_eq!(manifest.backups.len(), 1);
        assert_eq!(manifest.backups[0].target, "guides/setup.md");
    }
}
