use ferry_core::{EndpointConfig, StorageKind};

#[cfg(feature = "storage-remote")]
use crate::{FtpStorage, SftpStorage};
#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-redis")]
use crate::RedisStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageError, StorageResult};

/// Create a storage backend for one direction of a transfer cycle.
///
/// `root` is the effective root for this cycle (destination roots come from
/// the path builder, source roots straight from configuration); the staging
/// directory name is passed through so flat backends can strip it from
/// their prefix at construction time. Selection is a closed match over
/// [`StorageKind`]; configuration strings were already resolved to the
/// enum when the configuration was loaded.
pub async fn create_storage(
    endpoint: &EndpointConfig,
    root: &str,
    staging_dir: &str,
) -> StorageResult<Box<dyn Storage>> {
    match endpoint.kind {
        #[cfg(feature = "storage-local")]
        StorageKind::Folder => Ok(Box::new(LocalStorage::new(root))),

        #[cfg(not(feature = "storage-local"))]
        StorageKind::Folder => Err(StorageError::Config(
            "folder storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-remote")]
        StorageKind::Ftp => Ok(Box::new(FtpStorage::connect(&endpoint.ftp, root).await?)),

        #[cfg(feature = "storage-remote")]
        StorageKind::Sftp => Ok(Box::new(SftpStorage::connect(&endpoint.ftp, root).await?)),

        #[cfg(not(feature = "storage-remote"))]
        StorageKind::Ftp | StorageKind::Sftp => Err(StorageError::Config(
            "remote file transfer backends not available (storage-remote feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        StorageKind::S3 => Ok(Box::new(
            S3Storage::connect(&endpoint.s3, root, staging_dir).await?,
        )),

        #[cfg(not(feature = "storage-s3"))]
        StorageKind::S3 => Err(StorageError::Config(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-redis")]
        StorageKind::Redis => Ok(Box::new(RedisStorage::connect(&endpoint.redis, root).await?)),

        #[cfg(not(feature = "storage-redis"))]
        StorageKind::Redis => Err(StorageError::Config(
            "redis storage backend not available (storage-redis feature not enabled)".to_string(),
        )),
    }
}
