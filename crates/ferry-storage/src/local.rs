use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ferry_core::StorageKind;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::traits::{validate_name, Storage, StorageError, StorageResult};

/// Local filesystem storage backend.
///
/// The root is the staging subdirectory for a destination instance;
/// [`LocalStorage::promote`] renames staged files into the root's parent.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `root`.
    ///
    /// The directory itself is created lazily on first write, so a source
    /// instance pointed at a missing directory fails on `list`, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStorage { root: root.into() }
    }

    fn file_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            tracing::error!(
                backend = %self.kind(),
                path = %self.root.display(),
                error = %e,
                "Failed to list directory"
            );
            StorageError::List(format!("{}: {}", self.root.display(), e))
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StorageError::List(format!("{}: {}", self.root.display(), e))
        })? {
            let file_type = entry.file_type().await.map_err(|e| {
                StorageError::List(format!("{}: {}", entry.path().display(), e))
            })?;
            if file_type.is_file() {
                if let Ok(name) = entry.file_name().into_string() {
                    names.push(name);
                }
            }
        }

        Ok(names)
    }

    async fn read(&self, name: &str) -> StorageResult<Vec<u8>> {
        let path = self.file_path(name)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(name.to_string()));
        }

        fs::read(&path).await.map_err(|e| {
            tracing::error!(
                backend = %self.kind(),
                path = %path.display(),
                error = %e,
                "Failed to read file"
            );
            StorageError::Read(format!("{}: {}", path.display(), e))
        })
    }

    async fn write(&self, name: &str, content: &[u8]) -> StorageResult<()> {
        let path = self.file_path(name)?;

        fs::create_dir_all(&self.root).await.map_err(|e| {
            StorageError::Write(format!(
                "failed to create directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::Write(format!("failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(content).await.map_err(|e| {
            StorageError::Write(format!("failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::Write(format!("failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            backend = %self.kind(),
            path = %path.display(),
            size_bytes = content.len(),
            "Wrote file"
        );

        Ok(())
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        let path = self.file_path(name)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            tracing::warn!(
                backend = %self.kind(),
                path = %path.display(),
                "File for deletion was not found"
            );
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            tracing::error!(
                backend = %self.kind(),
                path = %path.display(),
                error = %e,
                "Failed to delete file"
            );
            StorageError::Delete(format!("{}: {}", path.display(), e))
        })?;

        Ok(())
    }

    async fn promote(&self) -> StorageResult<()> {
        let parent: &Path = self.root.parent().ok_or_else(|| {
            StorageError::Write(format!(
                "staging directory {} has no parent to promote into",
                self.root.display()
            ))
        })?;

        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            StorageError::List(format!("{}: {}", self.root.display(), e))
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StorageError::List(format!("{}: {}", self.root.display(), e))
        })? {
            let staged = entry.path();
            let file_type = entry.file_type().await.map_err(|e| {
                StorageError::List(format!("{}: {}", staged.display(), e))
            })?;
            if !file_type.is_file() {
                continue;
            }

            let target = parent.join(entry.file_name());
            fs::rename(&staged, &target).await.map_err(|e| {
                tracing::error!(
                    backend = %self.kind(),
                    from = %staged.display(),
                    to = %target.display(),
                    error = %e,
                    "Failed to promote staged file"
                );
                StorageError::Write(format!(
                    "failed to promote {} to {}: {}",
                    staged.display(),
                    target.display(),
                    e
                ))
            })?;

            tracing::debug!(
                backend = %self.kind(),
                from = %staged.display(),
                to = %target.display(),
                "Promoted staged file"
            );
        }

        Ok(())
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Folder
    }

    fn uses_staging(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_list_round_trips() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write("a.csv", b"one").await.unwrap();
        storage.write("b.json", b"two").await.unwrap();

        let mut names = storage.list().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a.csv", "b.json"]);
    }

    #[tokio::test]
    async fn write_then_read_is_byte_identical() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let content = b"THIS SHOULD STILL BE HERE".to_vec();
        storage.write("keep.xml", &content).await.unwrap();

        assert_eq!(storage.read("keep.xml").await.unwrap(), content);
    }

    #[tokio::test]
    async fn list_excludes_subdirectories() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write("file.txt", b"x").await.unwrap();
        fs::create_dir(dir.path().join("nested")).await.unwrap();

        assert_eq!(storage.list().await.unwrap(), vec!["file.txt"]);
    }

    #[tokio::test]
    async fn delete_twice_is_not_an_error() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write("gone.txt", b"x").await.unwrap();
        storage.delete("gone.txt").await.unwrap();
        storage.delete("gone.txt").await.unwrap();
    }

    #[tokio::test]
    async fn read_of_absent_file_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        assert!(matches!(
            storage.read("missing.bin").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn write_creates_missing_root() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("not").join("yet"));

        storage.write("new.txt", b"x").await.unwrap();
        assert_eq!(storage.list().await.unwrap(), vec!["new.txt"]);
    }

    #[tokio::test]
    async fn promote_moves_staged_files_into_parent() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("tmp");
        let storage = LocalStorage::new(&staging);

        storage.write("staged.csv", b"payload").await.unwrap();
        storage.promote().await.unwrap();

        assert!(storage.list().await.unwrap().is_empty());
        let promoted = LocalStorage::new(dir.path());
        assert_eq!(promoted.list().await.unwrap(), vec!["staged.csv"]);
        assert_eq!(promoted.read("staged.csv").await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn traversal_names_are_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        assert!(matches!(
            storage.read("../escape.txt").await,
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            storage.write("a/b.txt", b"x").await,
            Err(StorageError::InvalidName(_))
        ));
    }
}
