//! Error types for descriptor application

use std::path::PathBuf;

use docdelta_config::ConfigError;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while loading, applying or undoing descriptors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Descriptor is malformed or incomplete; nothing was mutated
    #[error("Invalid descriptor {descriptor}: {message}")]
    Validation {
        /// Descriptor filename
        descriptor: String,
        /// What is wrong with it
        message: String,
    },

    /// Descriptor document is not parseable structured data
    #[error("Failed to parse {path} as YAML: {message}")]
    Parse {
        /// Path of the unparseable document
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Descriptor already sits in the applied pool
    #[error("Descriptor already applied: {0}")]
    AlreadyApplied(String),

    /// Documentation root does not exist
    #[error("Documentation root not found: {0}")]
    DocsRootNotFound(PathBuf),

    /// Descriptor is not in the pending pool
    #[error("Descriptor not found: {0}")]
    DescriptorNotFound(String),

    /// Backup directory is empty or absent
    #[error("No backups available")]
    NoBackups,

    /// Requested backup generation does not exist for a target
    #[error("No backup generation {generation} for {target}")]
    BackupNotFound {
        /// Target path relative to the docs root
        target: String,
        /// Requested generation, 0 being the newest
        generation: usize,
    },

    /// File I/O failed
    #[error("IO error on {path} ({operation}): {source}")]
    Io {
        /// Path the operation touched
        path: PathBuf,
        /// Operation that failed
        operation: IoOperation,
        /// Underlying error
        source: std::io::Error,
    },

    /// Some targets were mutated before a later step failed
    #[error(
        "Descriptor {descriptor} partially applied ({} target(s) done) before {failed_stage} failed: {source}",
        .completed.len()
    )]
    PartiallyApplied {
        /// Descriptor filename
        descriptor: String,
        /// Targets whose bytes were already mutated
        completed: Vec<String>,
        /// Target path or pipeline stage that failed
        failed_stage: String,
        /// The failure itself
        source: Box<EngineError>,
    },

    /// Another operation holds the documentation root lock
    #[error("Documentation root is locked: {0}")]
    Locked(PathBuf),

    /// Configuration is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization of engine state failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification for front ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, aborted before mutation
    Validation,
    /// Missing root, descriptor or backup
    NotFound,
    /// Copy/append/move/write failure
    Io,
    /// Mutation happened, then something failed
    PartialFailure,
    /// Lock held by another caller
    Locked,
    /// Bad configuration
    Config,
}

/// IO operation type for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    /// Reading a file
    Read,
    /// Writing a whole file
    Write,
    /// Appending to a file
    Append,
    /// Copying a file
    Copy,
    /// Moving a file
    Move,
    /// Removing a file
    Delete,
    /// Creating a directory
    CreateDir,
    /// Listing a directory
    List,
}

impl std::fmt::Display for IoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IoOperation::Read => "read",
            IoOperation::Write => "write",
            IoOperation::Append => "append",
            IoOperation::Copy => "copy",
            IoOperation::Move => "move",
            IoOperation::Delete => "delete",
            IoOperation::CreateDir => "create dir",
            IoOperation::List => "list",
        };
        f.write_str(name)
    }
}

impl EngineError {
    /// Create an IO error
    pub fn io(path: impl Into<PathBuf>, operation: IoOperation, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Create a validation error
    pub fn validation(descriptor: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            descriptor: descriptor.into(),
            message: message.into(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation { .. }
            | EngineError::Parse { .. }
            | EngineError::AlreadyApplied(_) => ErrorKind::Validation,
            EngineError::DocsRootNotFound(_)
            | EngineError::DescriptorNotFound(_)
            | EngineError::NoBackups
            | EngineError::BackupNotFound { .. } => ErrorKind::NotFound,
            EngineError::Io { .. } | EngineError::Serialization(_) => ErrorKind::Io,
            EngineError::PartiallyApplied { .. } => ErrorKind::PartialFailure,
            EngineError::Locked(_) => ErrorKind::Locked,
            EngineError::Config(_) => ErrorKind::Config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_message_counts_targets() {
        let err = EngineError::PartiallyApplied {
            descriptor: "release.yaml".to_string(),
            completed: vec!["a.md".to_string(), "b.md".to_string()],
            failed_stage: "c.md".to_string(),
            source: Box::new(EngineError::io(
                "c.md",
                IoOperation::Append,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            )),
        };
        let message = err.to_string();
        assert!(message.contains("2 target(s) done"));
        assert!(message.contains("c.md"));
        assert_eq!(err.kind(), ErrorKind::PartialFailure);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(EngineError::NoBackups.kind(), ErrorKind::NotFound);
        assert_eq!(
            EngineError::validation("x.yaml", "bad").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            EngineError::AlreadyApplied("x.yaml".into()).kind(),
            ErrorKind::Validation
        );
    }
}
