//! Descriptor loading, validation and pending-pool listing

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use docdelta_config::{EngineConfig, ResolvedPaths};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{EngineError, IoOperation, Result};
use crate::manifest::{Manifest, ManifestStore};
use crate::models::{DescriptorStatus, UpdateDescriptor};
use crate::verifier::ContentVerifier;

/// Sequence that would terminate an update marker early
const MARKER_TERMINATOR: &str = "-->";

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    updated_files: Vec<String>,
    #[serde(default)]
    changes: Option<BTreeMap<String, Option<Vec<String>>>>,
}

/// Reads descriptors out of the pending pool
#[derive(Debug, Clone)]
pub struct DescriptorLoader {
    docs_root: PathBuf,
    history_dir: PathBuf,
    extensions: Vec<String>,
    manifest: ManifestStore,
}

impl DescriptorLoader {
    /// Loader over the pools described by `config`
    pub fn new(config: &EngineConfig, paths: &ResolvedPaths) -> Self {
        DescriptorLoader {
            docs_root: paths.docs_root.clone(),
            history_dir: paths.history_dir.clone(),
            extensions: config.descriptor_extensions.clone(),
            manifest: ManifestStore::new(&paths.history_dir),
        }
    }

    /// Path of a descriptor in the pending pool
    pub fn pending_path(&self, name: &str) -> PathBuf {
        self.docs_root.join(name)
    }

    /// Path a descriptor occupies once applied
    pub fn applied_path(&self, name: &str) -> PathBuf {
        self.history_dir.join(name)
    }

    /// Pending descriptors, sorted by name
    ///
    /// Everything in the pending pool minus names present in the applied
    /// pool or marked applied in the manifest. Identity is the file name;
    /// identical content under a new name is still pending.
    pub fn list_pending(&self) -> Result<Vec<String>> {
        if !self.docs_root.is_dir() {
            return Err(EngineError::DocsRootNotFound(self.docs_root.clone()));
        }
        let applied: HashSet<String> = self.list_applied()?.into_iter().collect();
        let manifest = self.load_manifest_lenient();

        let mut pending = Vec::new();
        for name in self.list_descriptor_files(&self.docs_root)? {
            if applied.contains(&name) || manifest.status(&name) == DescriptorStatus::Applied {
                debug!(descriptor = %name, "already applied, not pending");
                continue;
            }
            pending.push(name);
        }
        Ok(pending)
    }

    /// Applied descriptors, sorted by name
    pub fn list_applied(&self) -> Result<Vec<String>> {
        if !self.history_dir.is_dir() {
            return Ok(Vec::new());
        }
        self.list_descriptor_files(&self.history_dir)
    }

    /// Whether a descriptor named `name` was already applied
    pub fn is_applied(&self, name: &str) -> bool {
        self.applied_path(name).exists()
            || self.load_manifest_lenient().status(name) == DescriptorStatus::Applied
    }

    /// Name of an earlier applied descriptor with the same bytes as `descriptor`
    pub fn applied_duplicate(&self, descriptor: &UpdateDescriptor) -> Option<String> {
        self.load_manifest_lenient()
            .applied_with_content(&descriptor.content_hash)
            .filter(|applied| *applied != descriptor.name)
            .map(str::to_string)
    }

    /// Loads and validates a pending descriptor
    pub fn load(&self, name: &str) -> Result<UpdateDescriptor> {
        if Path::new(name).components().count() != 1 {
            return Err(EngineError::validation(name, "descriptor name must be a plain file name"));
        }
        let path = self.pending_path(name);
        if !path.is_file() {
            return Err(EngineError::DescriptorNotFound(name.to_string()));
        }
        let bytes = fs::read(&path).map_err(|e| EngineError::io(&path, IoOperation::Read, e))?;
        let descriptor = parse_descriptor(name, &path, &bytes)?;
        validate(&descriptor)?;
        debug!(
            descriptor = %name,
            targets = descriptor.updated_files.len(),
            "descriptor loaded"
        );
        Ok(descriptor)
    }

    fn list_descriptor_files(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = fs::read_dir(dir).map_err(|e| EngineError::io(dir, IoOperation::List, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::io(dir, IoOperation::List, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_descriptor = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
            if !is_descriptor {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn load_manifest_lenient(&self) -> Manifest {
        self.manifest.load().unwrap_or_else(|e| {
            warn!("ignoring unreadable manifest: {}", e);
            Manifest::default()
        })
    }
}

/// Parses descriptor bytes; `name` becomes the descriptor ID
pub fn parse_descriptor(name: &str, path: &Path, bytes: &[u8]) -> Result<UpdateDescriptor> {
    let value: serde_yaml::Value =
        serde_yaml::from_slice(bytes).map_err(|e| EngineError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mapping = value
        .as_mapping()
        .ok_or_else(|| EngineError::validation(name, "top level must be a mapping"))?;
    for key in ["updated_files", "changes"] {
        if !mapping.contains_key(key) {
            return Err(EngineError::validation(
                name,
                format!("missing required key `{}`", key),
            ));
        }
    }

    let raw: RawDescriptor = serde_yaml::from_value(value)
        .map_err(|e| EngineError::validation(name, e.to_string()))?;
    let changes = raw
        .changes
        .unwrap_or_default()
        .into_iter()
        .map(|(target, list)| (target, list.unwrap_or_default()))
        .collect();

    Ok(UpdateDescriptor {
        name: name.to_string(),
        content_hash: ContentVerifier::compute_hash(bytes),
        updated_files: raw.updated_files,
        changes,
    })
}

/// Rejects descriptors that could escape the docs root or corrupt markers
pub fn validate(descriptor: &UpdateDescriptor) -> Result<()> {
    let name = descriptor.name.as_str();
    if descriptor.updated_files.is_empty() {
        return Err(EngineError::validation(name, "`updated_files` lists no targets"));
    }

    let mut seen = HashSet::new();
    for target in &descriptor.updated_files {
        validate_target_path(name, target)?;
        if !seen.insert(target.as_str()) {
            return Err(EngineError::validation(
                name,
                format!("target `{}` listed more than once", target),
            ));
        }
    }

    for (target, changes) in &descriptor.changes {
        if !seen.contains(target.as_str()) {
            return Err(EngineError::validation(
                name,
                format!("`changes` names `{}` which is not in `updated_files`", target),
            ));
        }
        for change in changes {
            if change.contains(MARKER_TERMINATOR) {
                return Err(EngineError::validation(
                    name,
                    format!("change for `{}` contains `{}`", target, MARKER_TERMINATOR),
                ));
            }
            if change.contains(['\n', '\r']) {
                return Err(EngineError::validation(
                    name,
                    format!("change for `{}` spans multiple lines", target),
                ));
            }
        }
    }
    Ok(())
}

fn validate_target_path(name: &str, target: &str) -> Result<()> {
    let path = Path::new(target);
    if target.trim().is_empty() {
        return Err(EngineError::validation(name, "empty target path"));
    }
    if path.is_absolute() || path.has_root() {
        return Err(EngineError::validation(
            name,
            format!("target `{}` must be relative to the docs root", target),
        ));
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(EngineError::validation(
            name,
            format!("target `{}` leaves the docs root", target),
        ));
    }
    Ok(())
}

/// Re-serializes a descriptor for display
pub fn preview(descriptor: &UpdateDescriptor) -> Result<String> {
    serde_yaml::to_string(descriptor).map_err(|e| EngineError::Serialization(e.to_string()))
}
