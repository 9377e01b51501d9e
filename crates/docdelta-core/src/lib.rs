#![warn(missing_docs)]

//! Descriptor application engine for docdelta
//!
//! Applies declarative update descriptors (additive edits to a set of target
//! files) against a documentation tree, with pre-mutation backups, an
//! append-only audit log, undo from backups and a regenerated index.

pub mod applier;
pub mod audit;
pub mod backup;
pub mod descriptor;
pub mod error;
pub mod history;
pub mod index;
pub mod lock;
pub mod logging;
pub mod manager;
pub mod manifest;
pub mod models;
pub mod undo;
pub mod verifier;

// Re-export public API
pub use applier::{AppliedChanges, ChangeApplier};
pub use audit::AuditLog;
pub use backup::BackupManager;
pub use descriptor::DescriptorLoader;
pub use error::{EngineError, ErrorKind, IoOperation, Result};
pub use history::HistoryStore;
pub use index::IndexGenerator;
pub use lock::RootLock;
pub use manager::UpdateEngine;
pub use manifest::{Manifest, ManifestStore};
pub use models::{
    ApplyReport, ApplyWarning, AuditRecord, BackupRecord, DescriptorStatus, IndexReport,
    ManifestEntry, TargetAction, TargetReport, UndoReport, UpdateDescriptor,
};
pub use undo::UndoManager;
pub use verifier::ContentVerifier;

pub use docdelta_config::{EngineConfig, ResolvedPaths};
