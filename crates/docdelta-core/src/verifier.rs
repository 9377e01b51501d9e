//! Content hashing and copy verification

use crate::error::{EngineError, IoOperation, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Verifies file integrity through hashing
#[derive(Debug, Clone, Default)]
pub struct ContentVerifier;

impl ContentVerifier {
    /// Creates a new ContentVerifier instance
    pub fn new() -> Self {
        ContentVerifier
    }

    /// Computes the SHA-256 hash of `content` as lowercase hex
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }

    /// Hashes the current bytes of `path`
    pub fn hash_file(&self, path: &Path) -> Result<String> {
        let content = fs::read(path).map_err(|e| EngineError::io(path, IoOperation::Read, e))?;
        Ok(Self::compute_hash(&content))
    }

    /// Checks that `copy` holds exactly the bytes of `source`
    pub fn verify_copy(&self, source: &Path, copy: &Path) -> Result<()> {
        if self.hash_file(source)? == self.hash_file(copy)? {
            Ok(())
        } else {
            Err(EngineError::io(
                copy,
                IoOperation::Copy,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("content of {} does not match {}", copy.display(), source.display()),
                ),
            ))
        }
    }
}
