//! SFTP storage backend
//!
//! Session management is synchronous (libssh2), so every operation runs
//! under `spawn_blocking` with the session behind a mutex. One instance owns
//! exactly one session.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use ferry_core::{FtpSettings, StorageKind};
use ssh2::{ErrorCode, Session, Sftp};

use crate::traits::{task_err, validate_name, Storage, StorageError, StorageResult};

/// libssh2 SFTP status for a missing remote file.
const SFTP_NO_SUCH_FILE: i32 = 2;

struct SftpConn {
    session: Session,
    sftp: Sftp,
}

pub struct SftpStorage {
    root: String,
    conn: Arc<Mutex<SftpConn>>,
}

fn lock(conn: &Arc<Mutex<SftpConn>>) -> StorageResult<MutexGuard<'_, SftpConn>> {
    conn.lock()
        .map_err(|_| StorageError::Config("sftp session lock poisoned".to_string()))
}

fn is_no_such_file(err: &ssh2::Error) -> bool {
    err.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE)
}

/// Walk `path` one segment at a time, creating any missing directory.
///
/// Iterative rather than recursive: deep remote paths must not grow the
/// stack.
fn ensure_dir_path(sftp: &Sftp, path: &str) -> StorageResult<()> {
    let mut current = if path.starts_with('/') {
        String::from("/")
    } else {
        String::new()
    };

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(segment);

        if sftp.stat(Path::new(&current)).is_err() {
            sftp.mkdir(Path::new(&current), 0o755).map_err(|e| {
                StorageError::Config(format!("failed to create directory {}: {}", current, e))
            })?;
            tracing::debug!(path = %current, "Created remote directory");
        }
    }

    Ok(())
}

impl SftpStorage {
    /// Connect, authenticate, and make sure the root path exists.
    pub async fn connect(settings: &FtpSettings, root: &str) -> StorageResult<Self> {
        let settings = settings.clone();
        let host = settings.host.clone();
        let root = root.trim_end_matches('/').to_string();
        let root_for_task = root.clone();

        let conn = tokio::task::spawn_blocking(move || -> StorageResult<SftpConn> {
            let addr = format!("{}:{}", settings.host, settings.port);
            let tcp = TcpStream::connect(&addr).map_err(|e| {
                StorageError::Config(format!("failed to connect to {}: {}", addr, e))
            })?;

            let mut session = Session::new()
                .map_err(|e| StorageError::Config(format!("failed to create session: {}", e)))?;
            session.set_tcp_stream(tcp);
            session
                .handshake()
                .map_err(|e| StorageError::Config(format!("handshake with {} failed: {}", addr, e)))?;
            session
                .userauth_password(&settings.user, &settings.password)
                .map_err(|e| {
                    StorageError::Config(format!("authentication for {} failed: {}", settings.user, e))
                })?;

            let sftp = session
                .sftp()
                .map_err(|e| StorageError::Config(format!("failed to open sftp channel: {}", e)))?;

            ensure_dir_path(&sftp, &root_for_task)?;

            Ok(SftpConn { session, sftp })
        })
        .await
        .map_err(task_err)??;

        tracing::info!(host = %host, root = %root, "Connected to sftp server");

        Ok(SftpStorage {
            root,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn full_path(&self, name: &str) -> String {
        format!("{}/{}", self.root, name)
    }
}

/// Parent of a staged root, the location promote renames into.
fn parent_of(root: &str) -> StorageResult<String> {
    match root.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => Ok(parent.to_string()),
        _ => Err(StorageError::Write(format!(
            "staging directory {} has no parent to promote into",
            root
        ))),
    }
}

#[async_trait]
impl Storage for SftpStorage {
    async fn list(&self) -> StorageResult<Vec<String>> {
        let conn = Arc::clone(&self.conn);
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            let entries = guard.sftp.readdir(Path::new(&root)).map_err(|e| {
                tracing::error!(backend = "sftp", path = %root, error = %e, "Failed to list directory");
                StorageError::List(format!("{}: {}", root, e))
            })?;

            let mut names = Vec::new();
            for (path, stat) in entries {
                if stat.is_dir() {
                    continue;
                }
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
            Ok(names)
        })
        .await
        .map_err(task_err)?
    }

    async fn read(&self, name: &str) -> StorageResult<Vec<u8>> {
        validate_name(name)?;
        let conn = Arc::clone(&self.conn);
        let path = self.full_path(name);
        let name = name.to_string();

        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            let mut remote = match guard.sftp.open(Path::new(&path)) {
                Ok(remote) => remote,
                Err(e) if is_no_such_file(&e) => return Err(StorageError::NotFound(name)),
                Err(e) => {
                    tracing::error!(backend = "sftp", path = %path, error = %e, "Failed to open file");
                    return Err(StorageError::Read(format!("{}: {}", path, e)));
                }
            };

            let mut content = Vec::new();
            remote
                .read_to_end(&mut content)
                .map_err(|e| StorageError::Read(format!("{}: {}", path, e)))?;
            Ok(content)
        })
        .await
        .map_err(task_err)?
    }

    async fn write(&self, name: &str, content: &[u8]) -> StorageResult<()> {
        validate_name(name)?;
        let conn = Arc::clone(&self.conn);
        let path = self.full_path(name);
        let content = content.to_vec();

        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            let mut remote = guard.sftp.create(Path::new(&path)).map_err(|e| {
                tracing::error!(backend = "sftp", path = %path, error = %e, "Failed to create file");
                StorageError::Write(format!("{}: {}", path, e))
            })?;

            remote
                .write_all(&content)
                .map_err(|e| StorageError::Write(format!("{}: {}", path, e)))?;

            tracing::debug!(backend = "sftp", path = %path, size_bytes = content.len(), "Wrote file");
            Ok(())
        })
        .await
        .map_err(task_err)?
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        let conn = Arc::clone(&self.conn);
        let path = self.full_path(name);

        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            match guard.sftp.unlink(Path::new(&path)) {
                Ok(()) => Ok(()),
                Err(e) if is_no_such_file(&e) => {
                    tracing::warn!(backend = "sftp", path = %path, "File for deletion was not found");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(backend = "sftp", path = %path, error = %e, "Failed to delete file");
                    Err(StorageError::Delete(format!("{}: {}", path, e)))
                }
            }
        })
        .await
        .map_err(task_err)?
    }

    async fn promote(&self) -> StorageResult<()> {
        let conn = Arc::clone(&self.conn);
        let root = self.root.clone();
        let parent = parent_of(&self.root)?;

        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            let entries = guard
                .sftp
                .readdir(Path::new(&root))
                .map_err(|e| StorageError::List(format!("{}: {}", root, e)))?;

            for (staged, stat) in entries {
                if stat.is_dir() {
                    continue;
                }
                let Some(name) = staged.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let target = format!("{}/{}", parent, name);
                guard
                    .sftp
                    .rename(&staged, Path::new(&target), None)
                    .map_err(|e| {
                        tracing::error!(
                            backend = "sftp",
                            from = %staged.display(),
                            to = %target,
                            error = %e,
                            "Failed to promote staged file"
                        );
                        StorageError::Write(format!(
                            "failed to promote {} to {}: {}",
                            staged.display(),
                            target,
                            e
                        ))
                    })?;
                tracing::debug!(backend = "sftp", from = %staged.display(), to = %target, "Promoted staged file");
            }
            Ok(())
        })
        .await
        .map_err(task_err)?
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Sftp
    }

    fn uses_staging(&self) -> bool {
        true
    }

    async fn close(&self) -> StorageResult<()> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            if let Err(e) = guard.session.disconnect(None, "closing", None) {
                tracing::warn!(backend = "sftp", error = %e, "Error while disconnecting session");
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
    fn parent_of_staged_root() {
        assert_eq!(parent_of("/upload/2026/01/31/tmp").unwrap(), "/upload/2026/01/31");
        assert_eq!(parent_of("upload/tmp").unwrap(), "upload");
    }

    #[test]
    fn rootless_staging_cannot_promote() {
        assert!(parent_of("tmp").is_err());
        assert!(parent_of("/tmp").is_err());
    }
}
