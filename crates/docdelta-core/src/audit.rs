//! Append-only audit log of applied and restored descriptors

use crate::error::{EngineError, IoOperation, Result};
use crate::models::AuditRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SEPARATOR: &str = " - ";

/// Appends one line per action; never rewrites or truncates
///
/// Line format: `{ISO-8601 timestamp} - {Action} {subject}`.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Creates a new AuditLog writing to `path`
    pub fn new(path: PathBuf) -> Self {
        AuditLog { path }
    }

    /// Log file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a successful apply
    pub fn record_applied(&self, descriptor: &str) -> Result<()> {
        self.append(Utc::now(), "Applied", descriptor)
    }

    /// Records an undo/restore
    pub fn record_restored(&self, target: &str, backup_file: &str) -> Result<()> {
        self.append(
            Utc::now(),
            "Restored",
            &format!("{} from {}", target, backup_file),
        )
    }

    /// Appends `{timestamp} - {action} {subject}\n`
    pub fn append(&self, timestamp: DateTime<Utc>, action: &str, subject: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| EngineError::io(parent, IoOperation::CreateDir, e))?;
            }
        }

        let line = format!(
            "{}{}{} {}\n",
            timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            SEPARATOR,
            action,
            subject
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| EngineError::io(&self.path, IoOperation::Append, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| EngineError::io(&self.path, IoOperation::Append, e))?;

        debug!(action, subject, "audit line written");
        Ok(())
    }

    /// Parses every well-formed line, oldest first
    pub fn entries(&self) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| EngineError::io(&self.path, IoOperation::Read, e))?;

        let mut records = Vec::new();
        for (number, line) in content.lines().enumerate() {
            match parse_line(line) {
                Some(record) => records.push(record),
                None if line.trim().is_empty() => {}
                None => warn!("skipping malformed audit line {}: {}", number + 1, line),
            }
        }
        Ok(records)
    }
}

fn parse_line(line: &str) -> Option<AuditRecord> {
    let (timestamp, rest) = line.split_once(SEPARATOR)?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp).ok()?.with_timezone(&Utc);
    let (action, subject) = rest.split_once(' ')?;
    Some(AuditRecord {
        timestamp,
        action: action.to_string(),
        subject: subject.to_string(),
    })
}
