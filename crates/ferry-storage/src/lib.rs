//! Ferry Storage Library
//!
//! This crate provides the storage capability contract and implementations
//! for ferry. Every backend (local folder, FTP, SFTP, S3 bucket, Redis
//! key-list) satisfies the same [`Storage`] trait, so the transfer
//! orchestrator never touches a protocol client directly.
//!
//! # Staging and promotion
//!
//! Backends that model hierarchical directories (folder, FTP, SFTP) report
//! `uses_staging() == true`: files are written into a staging subdirectory
//! and made visible by [`Storage::promote`], an atomic rename into the
//! parent. Flat backends (S3, Redis) write directly to the final key, where
//! a single write either succeeds wholly or fails, and promote is a no-op.

pub mod factory;
#[cfg(feature = "storage-remote")]
pub mod ftp;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-redis")]
pub mod redis;
#[cfg(feature = "storage-s3")]
pub mod s3;
#[cfg(feature = "storage-remote")]
pub mod sftp;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use ferry_core::StorageKind;
#[cfg(feature = "storage-remote")]
pub use ftp::FtpStorage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-redis")]
pub use redis::RedisStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
#[cfg(feature = "storage-remote")]
pub use sftp::SftpStorage;
pub use traits::{Storage, StorageError, StorageResult};
