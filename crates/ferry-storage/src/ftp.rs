//! FTP storage backend
//!
//! The control connection is synchronous, so every operation runs under
//! `spawn_blocking` with the stream behind a mutex. The session stays
//! changed into the configured root directory after connect; operations use
//! bare file names against it.

use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use ferry_core::{FtpSettings, StorageKind};
use suppaftp::{FtpError, FtpStream, Status};

use crate::traits::{task_err, validate_name, Storage, StorageError, StorageResult};

pub struct FtpStorage {
    root: String,
    conn: Arc<Mutex<FtpStream>>,
}

fn lock(conn: &Arc<Mutex<FtpStream>>) -> StorageResult<MutexGuard<'_, FtpStream>> {
    conn.lock()
        .map_err(|_| StorageError::Config("ftp stream lock poisoned".to_string()))
}

fn is_file_unavailable(err: &FtpError) -> bool {
    matches!(err, FtpError::UnexpectedResponse(resp) if resp.status == Status::FileUnavailable)
}

/// Parse one LIST line into a file name, skipping directory entries.
///
/// Servers report directories with a leading `d` in the permission column;
/// the name is the final whitespace-separated token, which means names with
/// embedded spaces are truncated, the same contract the rest of the system
/// assumes (names carry no separators or spaces).
fn file_name_from_list_line(line: &str) -> Option<&str> {
    if line.trim_start().to_lowercase().starts_with('d') {
        return None;
    }
    line.split_whitespace().last()
}

/// Walk into `path` one segment at a time, creating missing directories.
///
/// Leaves the session changed into the final directory. Iterative rather
/// than recursive: deep remote paths must not grow the stack.
fn enter_dir_path(ftp: &mut FtpStream, path: &str) -> StorageResult<()> {
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if ftp.cwd(segment).is_err() {
            ftp.mkdir(segment).map_err(|e| {
                StorageError::Config(format!("failed to create directory {}: {}", segment, e))
            })?;
            ftp.cwd(segment).map_err(|e| {
                StorageError::Config(format!("failed to enter directory {}: {}", segment, e))
            })?;
            tracing::debug!(segment = %segment, "Created remote directory");
        }
    }
    Ok(())
}

impl FtpStorage {
    /// Connect, log in, and change into the root path, creating it if
    /// missing.
    pub async fn connect(settings: &FtpSettings, root: &str) -> StorageResult<Self> {
        let settings = settings.clone();
        let host = settings.host.clone();
        let root = root.trim_end_matches('/').to_string();
        let root_for_task = root.clone();

        let conn = tokio::task::spawn_blocking(move || -> StorageResult<FtpStream> {
            let addr = format!("{}:{}", settings.host, settings.port);
            let mut ftp = FtpStream::connect(&addr).map_err(|e| {
                StorageError::Config(format!("failed to connect to {}: {}", addr, e))
            })?;

            ftp.login(&settings.user, &settings.password).map_err(|e| {
                StorageError::Config(format!("login for {} failed: {}", settings.user, e))
            })?;

            ftp.transfer_type(suppaftp::types::FileType::Binary)
                .map_err(|e| StorageError::Config(format!("failed to set binary mode: {}", e)))?;

            enter_dir_path(&mut ftp, &root_for_task)?;

            Ok(ftp)
        })
        .await
        .map_err(task_err)??;

        tracing::info!(host = %host, root = %root, "Connected to ftp server");

        Ok(FtpStorage {
            root,
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl Storage for FtpStorage {
    async fn list(&self) -> StorageResult<Vec<String>> {
        let conn = Arc::clone(&self.conn);
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            let lines = guard.list(None).map_err(|e| {
                tracing::error!(backend = "ftp", path = %root, error = %e, "Failed to list directory");
                StorageError::List(format!("{}: {}", root, e))
            })?;

            Ok(lines
                .iter()
                .filter_map(|line| file_name_from_list_line(line))
                .map(str::to_string)
                .collect())
        })
        .await
        .map_err(task_err)?
    }

    async fn read(&self, name: &str) -> StorageResult<Vec<u8>> {
        validate_name(name)?;
        let conn = Arc::clone(&self.conn);
        let root = self.root.clone();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            match guard.retr_as_buffer(&name) {
                Ok(buffer) => Ok(buffer.into_inner()),
                Err(e) if is_file_unavailable(&e) => Err(StorageError::NotFound(name)),
                Err(e) => {
                    tracing::error!(backend = "ftp", path = %root, file = %name, error = %e, "Failed to read file");
                    Err(StorageError::Read(format!("{}/{}: {}", root, name, e)))
                }
            }
        })
        .await
        .map_err(task_err)?
    }

    async fn write(&self, name: &str, content: &[u8]) -> StorageResult<()> {
        validate_name(name)?;
        let conn = Arc::clone(&self.conn);
        let root = self.root.clone();
        let name = name.to_string();
        let content = content.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            let mut reader = Cursor::new(&content);
            guard.put_file(&name, &mut reader).map_err(|e| {
                tracing::error!(backend = "ftp", path = %root, file = %name, error = %e, "Failed to write file");
                StorageError::Write(format!("{}/{}: {}", root, name, e))
            })?;

            tracing::debug!(backend = "ftp", path = %root, file = %name, size_bytes = content.len(), "Wrote file");
            Ok(())
        })
        .await
        .map_err(task_err)?
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        let conn = Arc::clone(&self.conn);
        let root = self.root.clone();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            match guard.rm(&name) {
                Ok(()) => Ok(()),
                Err(e) if is_file_unavailable(&e) => {
                    tracing::warn!(backend = "ftp", path = %root, file = %name, "File for deletion was not found");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(backend = "ftp", path = %root, file = %name, error = %e, "Failed to delete file");
                    Err(StorageError::Delete(format!("{}/{}: {}", root, name, e)))
                }
            }
        })
        .await
        .map_err(task_err)?
    }

    async fn promote(&self) -> StorageResult<()> {
        let conn = Arc::clone(&self.conn);
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            let lines = guard
                .list(None)
                .map_err(|e| StorageError::List(format!("{}: {}", root, e)))?;
            let names: Vec<String> = lines
                .iter()
                .filter_map(|line| file_name_from_list_line(line))
                .map(str::to_string)
                .collect();

            // RNFR/RNTO relative to the staging directory the session sits in.
            for name in names {
                let target = format!("../{}", name);
                guard.rename(&name, &target).map_err(|e| {
                    tracing::error!(
                        backend = "ftp",
                        path = %root,
                        file = %name,
                        error = %e,
                        "Failed to promote staged file"
                    );
                    StorageError::Write(format!(
                        "failed to promote {}/{}: {}",
                        root, name, e
                    ))
                })?;
                tracing::debug!(backend = "ftp", path = %root, file = %name, "Promoted staged file");
            }
            Ok(())
        })
        .await
        .map_err(task_err)?
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Ftp
    }

    fn uses_staging(&self) -> bool {
        true
    }

    async fn close(&self) -> StorageResult<()> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            if let Err(e) = guard.quit() {
                tracing::warn!(backend = "ftp", error = %e, "Error while closing ftp session");
            }
            Ok(())
        })
        .await
        .map_err(task_err)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_lines_exclude_directories() {
        assert_eq!(
            file_name_from_list_line("-rw-r--r--  1 ftp ftp   120 Jan 31 10:00 report.csv"),
            Some("report.csv")
        );
        assert_eq!(
            file_name_from_list_line("drwxr-xr-x  2 ftp ftp  4096 Jan 31 10:00 archive"),
            None
        );
    }

    #[test]
    fn blank_list_line_yields_nothing() {
        assert_eq!(file_name_from_list_line("   "), None);
    }
}
