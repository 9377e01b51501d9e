//! UpdateEngine coordinator for descriptor operations
//!
//! The UpdateEngine is the single entry point front ends call. It composes
//! the loader, applier, backup manager, history store, undo manager, index
//! generator and audit log, and owns the order in which they run:
//! load -> apply (with backups) -> archive -> manifest -> audit -> index.

use std::fs;

use chrono::Utc;
use docdelta_config::{EngineConfig, ResolvedPaths};
use tracing::{info, warn};

use crate::{
    applier::ChangeApplier,
    audit::AuditLog,
    backup::BackupManager,
    descriptor::{self, DescriptorLoader},
    error::{EngineError, IoOperation, Result},
    history::HistoryStore,
    index::IndexGenerator,
    lock::RootLock,
    manifest::ManifestStore,
    models::{
        ApplyReport, ApplyWarning, AuditRecord, BackupRecord, IndexReport, UndoReport,
        UpdateDescriptor,
    },
    undo::UndoManager,
};

/// Central coordinator for descriptor operations
///
/// # Example
///
/// ```ignore
/// use docdelta_config::EngineConfig;
/// use docdelta_core::UpdateEngine;
///
/// let engine = UpdateEngine::new(EngineConfig::for_project("."))?;
/// for name in engine.list_pending()? {
///     let report = engine.apply(&name)?;
///     println!("{} -> {:?}", name, report.targets);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct UpdateEngine {
    config: EngineConfig,
    paths: ResolvedPaths,
    loader: DescriptorLoader,
    backups: BackupManager,
    history: HistoryStore,
    manifest: ManifestStore,
    index: IndexGenerator,
    audit: AuditLog,
}

impl UpdateEngine {
    /// Builds every component from one validated configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let paths = config.resolve();
        Ok(UpdateEngine {
            loader: DescriptorLoader::new(&config, &paths),
            backups: BackupManager::new(paths.backup_dir.clone()),
            history: HistoryStore::new(paths.docs_root.clone(), paths.history_dir.clone()),
            manifest: ManifestStore::new(&paths.history_dir),
            index: IndexGenerator::new(&paths),
            audit: AuditLog::new(paths.audit_log.clone()),
            config,
            paths,
        })
    }

    /// Configuration in effect
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolved locations
    pub fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    /// Creates the history, backup and log directories
    pub fn init_workspace(&self) -> Result<()> {
        self.ensure_docs_root()?;
        let log_dir = self.paths.audit_log.parent().filter(|p| !p.as_os_str().is_empty());
        for dir in [Some(self.paths.history_dir.as_path()), Some(self.paths.backup_dir.as_path()), log_dir]
            .into_iter()
            .flatten()
        {
            fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, IoOperation::CreateDir, e))?;
        }
        Ok(())
    }

    /// Descriptors waiting to be applied, sorted by name
    pub fn list_pending(&self) -> Result<Vec<String>> {
        self.loader.list_pending()
    }

    /// Descriptors already applied, sorted by name
    pub fn list_applied(&self) -> Result<Vec<String>> {
        self.loader.list_applied()
    }

    /// Loads and validates a pending descriptor
    pub fn load(&self, name: &str) -> Result<UpdateDescriptor> {
        self.ensure_docs_root()?;
        self.loader.load(name)
    }

    /// YAML rendering of a pending descriptor
    pub fn preview(&self, name: &str) -> Result<String> {
        descriptor::preview(&self.load(name)?)
    }

    /// Applies a pending descriptor
    ///
    /// `Ok` means fully applied. [`EngineError::PartiallyApplied`] means some
    /// targets were mutated; any other error means nothing was.
    pub fn apply(&self, name: &str) -> Result<ApplyReport> {
        self.run_apply(name, false)
    }

    /// Validates and reports what [`apply`](Self::apply) would do, touching nothing
    pub fn dry_run(&self, name: &str) -> Result<ApplyReport> {
        self.run_apply(name, true)
    }

    fn run_apply(&self, name: &str, dry_run: bool) -> Result<ApplyReport> {
        self.ensure_docs_root()?;
        let _lock = if dry_run { None } else { self.lock()? };

        let descriptor = self.loader.load(name)?;
        if self.loader.is_applied(name) {
            return Err(EngineError::AlreadyApplied(name.to_string()));
        }
        let duplicate = self.loader.applied_duplicate(&descriptor);

        let backups = self.config.backup_enabled.then(|| self.backups.clone());
        let applier = ChangeApplier::new(self.paths.docs_root.clone(), backups)
            .with_manifest(self.manifest.clone());
        let applied = applier.apply(&descriptor, dry_run)?;

        let mut report = ApplyReport {
            descriptor: name.to_string(),
            dry_run,
            targets: applied.targets,
            backups: applied.backups,
            warnings: applied.warnings,
            index: None,
        };
        if let Some(applied_as) = duplicate {
            warn!(descriptor = %name, applied_as = %applied_as, "identical descriptor applied before");
            report
                .warnings
                .push(ApplyWarning::DuplicateContent { applied_as });
        }
        if dry_run {
            info!(descriptor = %name, "dry run complete");
            return Ok(report);
        }

        if let Err(e) = self.history.archive(name) {
            let completed: Vec<String> =
                report.mutated_targets().into_iter().map(str::to_string).collect();
            if completed.is_empty() {
                return Err(e);
            }
            return Err(EngineError::PartiallyApplied {
                descriptor: name.to_string(),
                completed,
                failed_stage: "history".to_string(),
                source: Box::new(e),
            });
        }

        let content_hash = descriptor.content_hash.clone();
        if let Err(e) = self
            .manifest
            .update(|m| m.mark_applied(name, &content_hash, Utc::now()))
        {
            warn!(descriptor = %name, "manifest not updated: {}", e);
            report.warnings.push(ApplyWarning::Manifest {
                message: e.to_string(),
            });
        }

        if let Err(e) = self.audit.record_applied(name) {
            warn!(descriptor = %name, "audit log not written: {}", e);
            report.warnings.push(ApplyWarning::AuditLog {
                message: e.to_string(),
            });
        }

        if self.config.index_autogen {
            match self.index.generate() {
                Ok(index) => report.index = Some(index),
                Err(e) => {
                    warn!(descriptor = %name, "index not regenerated: {}", e);
                    report.warnings.push(ApplyWarning::Index {
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            descriptor = %name,
            targets = report.targets.len(),
            warnings = report.warnings.len(),
            "descriptor applied"
        );
        Ok(report)
    }

    /// Restores the most recent backup over its target
    pub fn undo(&self) -> Result<UndoReport> {
        self.ensure_docs_root()?;
        let _lock = self.lock()?;
        let report = self.undo_manager().undo()?;
        Ok(self.audit_restore(report))
    }

    /// Restores backup generation `generation` (0 = newest) of `target`
    pub fn restore(&self, target: &str, generation: usize) -> Result<UndoReport> {
        self.ensure_docs_root()?;
        let _lock = self.lock()?;
        let report = self.undo_manager().restore(target, generation)?;
        Ok(self.audit_restore(report))
    }

    /// Backups of `target`, newest first
    pub fn backup_history(&self, target: &str) -> Result<Vec<BackupRecord>> {
        let manifest = self.manifest.load()?;
        self.backups.history(target, &manifest)
    }

    /// Rewrites the index from the current file listing
    pub fn regenerate_index(&self) -> Result<IndexReport> {
        self.ensure_docs_root()?;
        let _lock = self.lock()?;
        self.index.generate()
    }

    /// Parsed audit log, oldest first
    pub fn audit_entries(&self) -> Result<Vec<AuditRecord>> {
        self.audit.entries()
    }

    fn undo_manager(&self) -> UndoManager {
        UndoManager::new(
            self.paths.docs_root.clone(),
            self.backups.clone(),
            self.manifest.clone(),
        )
    }

    fn audit_restore(&self, mut report: UndoReport) -> UndoReport {
        if let Err(e) = self.audit.record_restored(&report.target, &report.backup_file) {
            warn!(target = %report.target, "audit log not written: {}", e);
            report.audit_warning = Some(e.to_string());
        }
        report
    }

    fn lock(&self) -> Result<Option<RootLock>> {
        if !self.config.lock_enabled {
            return Ok(None);
        }
        RootLock::acquire(&self.paths.lock_file).map(Some)
    }

    fn ensure_docs_root(&self) -> Result<()> {
        if self.paths.docs_root.is_dir() {
            Ok(())
        } else {
            Err(EngineError::DocsRootNotFound(self.paths.docs_root.clone()))
        }
    }
}
