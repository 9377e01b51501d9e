//! Data models for descriptor application

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker template wrapped around every appended change
pub const MARKER_OPEN: &str = "<!-- Update: ";
/// Closing half of the marker; change text must not contain it
pub const MARKER_CLOSE: &str = " -->";

/// Renders one change string as the block appended to a target file
pub fn marker_line(change: &str) -> String {
    format!("\n{}{}{}\n", MARKER_OPEN, change, MARKER_CLOSE)
}

/// A batch of additive edits, identified by its filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDescriptor {
    /// Filename within the pending pool; acts as the descriptor ID
    #[serde(skip)]
    pub name: String,
    /// SHA-256 of the document bytes as loaded
    #[serde(skip)]
    pub content_hash: String,
    /// Target paths relative to the docs root, in application order
    pub updated_files: Vec<String>,
    /// Change strings per target, in append order
    pub changes: BTreeMap<String, Vec<String>>,
}

impl UpdateDescriptor {
    /// Change strings for `target`; an absent entry is an empty list
    pub fn changes_for(&self, target: &str) -> &[String] {
        self.changes.get(target).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Applied/pending state as tracked by the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorStatus {
    /// Not yet applied
    Pending,
    /// Applied and archived in the history pool
    Applied,
}

/// Manifest entry for a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Current state
    pub status: DescriptorStatus,
    /// When the descriptor was applied
    pub applied_at: Option<DateTime<Utc>>,
    /// Hash of the descriptor bytes, used to flag re-issued copies
    pub content_hash: String,
}

/// A pre-mutation snapshot stored as `{basename}.{YYYYMMDDHHMM}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Target path relative to the docs root
    pub target: String,
    /// File name inside the backup directory
    pub backup_file: String,
    /// Minute-resolution stamp taken from the file name
    pub stamp: String,
    /// Full-precision creation time, known only for recorded backups
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// What the applier did (or would do, on a dry run) to one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TargetAction {
    /// Change markers appended
    Appended {
        /// Number of markers
        changes: usize,
    },
    /// Target exists but has no changes listed
    Unchanged,
    /// Target missing; nothing created
    SkippedMissing,
}

/// Per-target outcome of an apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    /// Target path relative to the docs root
    pub target: String,
    /// What happened
    pub action: TargetAction,
    /// Backup taken before mutation
    pub backup: Option<String>,
}

/// Non-fatal problems surfaced alongside a successful apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApplyWarning {
    /// Target skipped because it does not exist
    MissingTarget {
        /// Target path
        target: String,
    },
    /// Audit line could not be written
    AuditLog {
        /// Failure text
        message: String,
    },
    /// Index regeneration failed
    Index {
        /// Failure text
        message: String,
    },
    /// Manifest could not be updated
    Manifest {
        /// Failure text
        message: String,
    },
    /// Same bytes as a descriptor applied earlier under another name
    DuplicateContent {
        /// Name the earlier copy was applied as
        applied_as: String,
    },
}

impl std::fmt::Display for ApplyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyWarning::MissingTarget { target } => {
                write!(f, "target {} does not exist, skipped", target)
            }
            ApplyWarning::AuditLog { message } => write!(f, "audit log not written: {}", message),
            ApplyWarning::Index { message } => write!(f, "index not regenerated: {}", message),
            ApplyWarning::Manifest { message } => write!(f, "manifest not updated: {}", message),
            ApplyWarning::DuplicateContent { applied_as } => {
                write!(f, "identical content was already applied as {}", applied_as)
            }
        }
    }
}

/// Result of a regenerated index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// Markdown index location
    pub path: PathBuf,
    /// Linked files, relative to the docs root, sorted
    pub entries: Vec<String>,
    /// HTML mirror location, when enabled
    pub html: Option<PathBuf>,
}

/// Outcome of a fully successful apply or a dry run
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    /// Descriptor filename
    pub descriptor: String,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Per-target outcomes, in descriptor order
    pub targets: Vec<TargetReport>,
    /// Backups created
    pub backups: Vec<BackupRecord>,
    /// Non-fatal problems
    pub warnings: Vec<ApplyWarning>,
    /// Index regeneration result, when it ran
    pub index: Option<IndexReport>,
}

impl ApplyReport {
    /// Targets whose bytes changed (or would change)
    pub fn mutated_targets(&self) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|t| matches!(t.action, TargetAction::Appended { .. }))
            .map(|t| t.target.as_str())
            .collect()
    }
}

/// Outcome of an undo or an explicit restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoReport {
    /// Target path relative to the docs root
    pub target: String,
    /// Backup file the bytes came from
    pub backup_file: String,
    /// Absolute or root-relative path that was overwritten
    pub restored_path: PathBuf,
    /// Non-fatal audit failure, if any
    pub audit_warning: Option<String>,
}

/// One parsed audit log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// When the action happened
    pub timestamp: DateTime<Utc>,
    /// Verb, e.g. `Applied` or `Restored`
    pub action: String,
    /// Rest of the line
    pub subject: String,
}
