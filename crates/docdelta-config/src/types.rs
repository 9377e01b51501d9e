//! Core configuration types and data structures

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Log levels accepted by `log_level`
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Lock file name placed in the documentation root
const LOCK_FILE_NAME: &str = ".docdelta.lock";

/// Operational settings of the update engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the managed documents (also holds pending descriptors)
    pub default_docs_path: PathBuf,
    /// Optional project root; relative paths resolve against it
    pub project_path: Option<PathBuf>,
    /// Snapshot targets before mutating them
    pub backup_enabled: bool,
    /// Regenerate the index after every successful apply
    pub index_autogen: bool,
    /// Max level for the tracing subscriber
    pub log_level: String,
    /// Applied pool, relative to the docs root
    pub history_dir: PathBuf,
    /// Flat backup directory, relative to the project root
    pub backup_dir: PathBuf,
    /// Append-only audit log, relative to the project root
    pub audit_log: PathBuf,
    /// Index document name inside the docs root
    pub index_file: String,
    /// Also render the index to HTML next to the markdown index
    pub index_html: bool,
    /// File extensions recognized as descriptors in the pending pool
    pub descriptor_extensions: Vec<String>,
    /// Guard apply/undo/index with a lock file in the docs root
    pub lock_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_docs_path: PathBuf::from("docs"),
            project_path: None,
            backup_enabled: true,
            index_autogen: true,
            log_level: "info".to_string(),
            history_dir: PathBuf::from("yaml-history"),
            backup_dir: PathBuf::from("backups"),
            audit_log: PathBuf::from("logs/update.log"),
            index_file: "index.md".to_string(),
            index_html: false,
            descriptor_extensions: vec!["yaml".to_string(), "yml".to_string()],
            lock_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Config rooted at `project_path`, everything else default
    pub fn for_project(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: Some(project_path.into()),
            ..Self::default()
        }
    }

    /// Checks the settings that would otherwise fail deep inside the engine
    pub fn validate(&self) -> Result<()> {
        if self.default_docs_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "default_docs_path must not be empty".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown log_level '{}', expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        let index = Path::new(&self.index_file);
        if index.components().count() != 1 || !self.index_file.ends_with(".md") {
            return Err(ConfigError::Validation(format!(
                "index_file '{}' must be a plain .md file name",
                self.index_file
            )));
        }
        if self.descriptor_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "descriptor_extensions must list at least one extension".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolves every configured location into a concrete path
    pub fn resolve(&self) -> ResolvedPaths {
        let workspace_root = self
            .project_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let docs_root = join_relative(&workspace_root, &self.default_docs_path);
        let index_file = docs_root.join(&self.index_file);
        let index_html = self
            .index_html
            .then(|| index_file.with_extension("html"));

        ResolvedPaths {
            history_dir: join_relative(&docs_root, &self.history_dir),
            backup_dir: join_relative(&workspace_root, &self.backup_dir),
            audit_log: join_relative(&workspace_root, &self.audit_log),
            lock_file: docs_root.join(LOCK_FILE_NAME),
            index_file,
            index_html,
            docs_root,
            workspace_root,
        }
    }

    /// Whether `extension` marks a descriptor document
    pub fn is_descriptor_extension(&self, extension: &str) -> bool {
        self.descriptor_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

fn join_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Concrete locations derived from an [`EngineConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub workspace_root: PathBuf,
    pub docs_root: PathBuf,
    pub history_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub audit_log: PathBuf,
    pub index_file: PathBuf,
    pub index_html: Option<PathBuf>,
    pub lock_file: PathBuf,
}

impl ResolvedPaths {
    /// Directories the index generator must not descend into
    pub fn excluded_dirs(&self) -> Vec<&Path> {
        let mut dirs = vec![self.history_dir.as_path(), self.backup_dir.as_path()];
        if let Some(parent) = self.audit_log.parent() {
            dirs.push(parent);
        }
        dirs
    }
}

/// Configuration store trait
pub trait ConfigStore {
    /// Load configuration
    fn load_config(&mut self) -> Result<EngineConfig>;
    /// Save configuration
    fn save_config(&self, config: &EngineConfig) -> Result<()>;
    /// Validate configuration
    fn validate_config(&self, config: &EngineConfig) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve_under_current_dir() {
        let paths = EngineConfig::default().resolve();
        assert_eq!(paths.workspace_root, PathBuf::from("."));
        assert_eq!(paths.docs_root, PathBuf::from("./docs"));
        assert_eq!(paths.history_dir, PathBuf::from("./docs/yaml-history"));
        assert_eq!(paths.backup_dir, PathBuf::from("./backups"));
        assert_eq!(paths.audit_log, PathBuf::from("./logs/update.log"));
        assert_eq!(paths.index_file, PathBuf::from("./docs/index.md"));
        assert!(paths.index_html.is_none());
    }

    #[test]
    fn test_project_path_roots_relative_paths() {
        let mut config = EngineConfig::for_project("/srv/project");
        config.index_html = true;
        let paths = config.resolve();
        assert_eq!(paths.docs_root, PathBuf::from("/srv/project/docs"));
        assert_eq!(paths.backup_dir, PathBuf::from("/srv/project/backups"));
        assert_eq!(
            paths.index_html,
            Some(PathBuf::from("/srv/project/docs/index.html"))
        );
    }

    #[test]
    fn test_absolute_docs_path_ignores_project_path() {
        let mut config = EngineConfig::for_project("/srv/project");
        config.default_docs_path = PathBuf::from("/var/docs");
        assert_eq!(config.resolve().docs_root, PathBuf::from("/var/docs"));
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = EngineConfig::default();
        assert!(config.validate().is_ok());
        config.log_level = "chatty".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_nested_index_file() {
        let mut config = EngineConfig::default();
        config.index_file = "sub/index.md".to_string();
        assert!(config.validate().is_err());
        config.index_file = "index.txt".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_descriptor_extension_match_is_case_insensitive() {
        let config = EngineConfig::default();
        assert!(config.is_descriptor_extension("YAML"));
        assert!(config.is_descriptor_extension("yml"));
        assert!(!config.is_descriptor_extension("md"));
    }
}
