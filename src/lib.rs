//! Shared fixtures for docdelta end-to-end tests
//!
//! A [`Workspace`] is a throwaway project directory with a `docs/` root and
//! an [`UpdateEngine`] configured against it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use docdelta_core::{EngineConfig, UpdateEngine};
use tempfile::TempDir;

/// Temporary project with an engine pointed at it
pub struct Workspace {
    dir: TempDir,
    engine: UpdateEngine,
}

impl Workspace {
    /// Default configuration rooted at a fresh temp dir
    pub fn new() -> io::Result<Self> {
        Self::with_config(|_| {})
    }

    /// Same as [`Workspace::new`] with a chance to tweak the configuration
    pub fn with_config(tweak: impl FnOnce(&mut EngineConfig)) -> io::Result<Self> {
        let dir = TempDir::new()?;
        let mut config = EngineConfig::for_project(dir.path());
        tweak(&mut config);
        let engine = UpdateEngine::new(config)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        fs::create_dir_all(&engine.paths().docs_root)?;
        Ok(Workspace { dir, engine })
    }

    /// Engine under test
    pub fn engine(&self) -> &UpdateEngine {
        &self.engine
    }

    /// Project root
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Documentation root
    pub fn docs(&self) -> PathBuf {
        self.engine.paths().docs_root.clone()
    }

    /// Writes a document relative to the docs root
    pub fn write_doc(&self, relative: &str, content: &str) -> io::Result<()> {
        let path = self.docs().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)
    }

    /// Reads a document relative to the docs root
    pub fn read_doc(&self, relative: &str) -> io::Result<String> {
        fs::read_to_string(self.docs().join(relative))
    }

    /// Drops a descriptor into the pending pool
    pub fn write_descriptor(&self, name: &str, yaml: &str) -> io::Result<()> {
        fs::write(self.docs().join(name), yaml)
    }

    /// Backup file names, sorted
    pub fn backup_files(&self) -> io::Result<Vec<String>> {
        list_names(&self.engine.paths().backup_dir)
    }

    /// Applied pool file names, sorted
    pub fn history_files(&self) -> io::Result<Vec<String>> {
        list_names(&self.engine.paths().history_dir)
    }

    /// Raw audit log lines
    pub fn audit_lines(&self) -> io::Result<Vec<String>> {
        let path = &self.engine.paths().audit_log;
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(fs::read_to_string(path)?.lines().map(str::to_string).collect())
    }
}

fn list_names(dir: &Path) -> io::Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
