//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must
//! implement, together with the shared error taxonomy.

use async_trait::async_trait;
use ferry_core::StorageKind;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("List failed: {0}")]
    List(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Delete failed: {0}")]
    Delete(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends must implement this trait. This allows the transfer
/// orchestrator to work with any backend without coupling to protocol
/// details.
///
/// **Names:** file references are bare names (extension included, no path
/// separators), scoped to the backend's configured root. Uniqueness holds
/// only within a single listing snapshot; listing is not transactionally
/// consistent with concurrent writers.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Enumerate the file names currently present under the root.
    ///
    /// Sub-directories are excluded. The enumeration is finite and
    /// restartable; a fresh call produces a fresh snapshot.
    async fn list(&self) -> StorageResult<Vec<String>>;

    /// Read the full content of a named file.
    ///
    /// Returns [`StorageError::NotFound`] if the file is absent.
    async fn read(&self, name: &str) -> StorageResult<Vec<u8>>;

    /// Write content under a name, creating the root location if absent.
    async fn write(&self, name: &str, content: &[u8]) -> StorageResult<()>;

    /// Delete a named file.
    ///
    /// Idempotent: deleting an already-absent file is logged as a warning
    /// and returns `Ok`.
    async fn delete(&self, name: &str) -> StorageResult<()>;

    /// Move everything in the staging subdirectory into its parent.
    ///
    /// Only meaningful on backends that report [`Storage::uses_staging`];
    /// the default implementation is a no-op for flat backends, which write
    /// directly to the final key.
    async fn promote(&self) -> StorageResult<()> {
        Ok(())
    }

    /// The backend family this instance belongs to.
    fn kind(&self) -> StorageKind;

    /// Whether writes land in a staging subdirectory that requires a
    /// [`Storage::promote`] call before files become visible.
    fn uses_staging(&self) -> bool {
        false
    }

    /// Release the underlying connection or session.
    ///
    /// Invoked by the orchestrator on every path out of a transfer cycle,
    /// including failure paths. Safe to call more than once; backends
    /// without a session keep the default no-op.
    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Map a failed blocking-task join onto the storage error taxonomy.
#[cfg(feature = "storage-remote")]
pub(crate) fn task_err(e: tokio::task::JoinError) -> StorageError {
    StorageError::Config(format!("blocking storage task failed: {}", e))
}

/// Reject names that could escape the backend root.
///
/// File references are bare names; anything carrying a path separator or a
/// parent-directory component is refused before it reaches a protocol
/// client.
pub(crate) fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_validation() {
        assert!(validate_name("report.csv").is_ok());
        assert!(validate_name("a.b.c.json").is_ok());
    }

    #[test]
    fn traversal_names_are_rejected() {
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b.csv").is_err());
        assert!(validate_name("..\\x").is_err());
        assert!(validate_name("../etc/passwd").is_err());
    }
}
