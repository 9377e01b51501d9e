//! Relocates applied descriptors into the history pool

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{EngineError, IoOperation, Result};

/// Moves descriptors from the pending pool into the applied pool
#[derive(Debug, Clone)]
pub struct HistoryStore {
    docs_root: PathBuf,
    history_dir: PathBuf,
}

impl HistoryStore {
    /// Store moving from `docs_root` into `history_dir`
    pub fn new(docs_root: PathBuf, history_dir: PathBuf) -> Self {
        HistoryStore {
            docs_root,
            history_dir,
        }
    }

    /// Applied pool directory
    pub fn history_dir(&self) -> &Path {
        &self.history_dir
    }

    /// Moves `name` into the history pool, keeping its file name
    ///
    /// Either the descriptor ends up in the history pool and out of the
    /// pending pool, or it stays pending and the history pool is untouched.
    pub fn archive(&self, name: &str) -> Result<PathBuf> {
        let source = self.docs_root.join(name);
        let destination = self.history_dir.join(name);

        if destination.exists() {
            return Err(EngineError::AlreadyApplied(name.to_string()));
        }
        fs::create_dir_all(&self.history_dir)
            .map_err(|e| EngineError::io(&self.history_dir, IoOperation::CreateDir, e))?;

        if let Err(rename_err) = fs::rename(&source, &destination) {
            if !source.exists() {
                return Err(EngineError::io(&source, IoOperation::Move, rename_err));
            }
            warn!(
                descriptor = %name,
                "rename failed ({}), falling back to copy and delete",
                rename_err
            );
            self.copy_then_remove(&source, &destination)?;
        }

        info!(descriptor = %name, path = %destination.display(), "descriptor archived");
        Ok(destination)
    }

    fn copy_then_remove(&self, source: &Path, destination: &Path) -> Result<()> {
        let staging = destination.with_extension("partial");
        fs::copy(source, &staging).map_err(|e| {
            let _ = fs::remove_file(&staging);
            EngineError::io(&staging, IoOperation::Copy, e)
        })?;
        fs::rename(&staging, destination).map_err(|e| {
            let _ = fs::remove_file(&staging);
            EngineError::io(destination, IoOperation::Move, e)
        })?;
        if let Err(e) = fs::remove_file(source) {
            // keep the descriptor pending rather than present in both pools
            let _ = fs::remove_file(destination);
            return Err(EngineError::io(source, IoOperation::Delete, e));
        }
        Ok(())
    }
}
