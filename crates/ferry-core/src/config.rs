//! Configuration module
//!
//! This module provides the process-wide configuration for ferry: per-direction
//! (read/write) storage endpoints, transfer behavior, and broker settings.
//! Everything is read from environment variables once at startup and then
//! passed by reference; nothing here is global or mutable after construction.

use std::env;

use crate::storage_types::StorageKind;

const MAX_FILES_BATCH: usize = 5;
const PROCESS_INTERVAL_SECS: u64 = 5;
const STAGING_DIR: &str = "tmp";
const RABBIT_MQ_MAX_RETRIES: u32 = 3;

/// FTP/SFTP server connection settings for one direction.
#[derive(Clone, Debug)]
pub struct FtpSettings {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: u16,
}

/// S3 bucket connection settings for one direction.
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, Ceph RGW, etc.)
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Use the ambient AWS credential chain instead of explicit keys.
    pub use_ambient_creds: bool,
    /// Request AES256 server-side encryption on every write.
    pub server_side_encryption: bool,
}

/// Redis key-list settings for one direction.
///
/// The list key itself is the endpoint's configured path; only connection
/// details live here.
#[derive(Clone, Debug)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

/// One side (source or destination) of a transfer.
#[derive(Clone, Debug)]
pub struct EndpointConfig {
    pub kind: StorageKind,
    pub path: String,
    pub ftp: FtpSettings,
    pub s3: S3Settings,
    pub redis: RedisSettings,
}

/// Transfer behavior settings.
#[derive(Clone, Debug)]
pub struct TransferSettings {
    /// Maximum number of files moved per cycle.
    pub batch_size: usize,
    /// Seconds between cycles in watch mode.
    pub poll_interval_secs: u64,
    /// Append YYYY/MM/DD (current UTC date) to the destination root.
    pub date_partition: bool,
    /// Staging subdirectory files land in before promotion.
    pub staging_dir: String,
    /// Retain the source copy instead of deleting it after a write.
    pub copy_source: bool,
    /// Publish a transfer event per source file instead of moving bytes.
    pub publish_mode: bool,
    /// Drive transfers from consumed queue events instead of polling.
    pub consume_mode: bool,
}

/// RabbitMQ broker settings.
#[derive(Clone, Debug)]
pub struct QueueSettings {
    pub host: String,
    pub port: u16,
    /// Credentials are optional; absence means an unauthenticated connection.
    pub username: Option<String>,
    pub password: Option<String>,
    pub queue_name: String,
    /// Publish attempts before a negative confirmation becomes terminal.
    pub max_publish_retries: u32,
    /// Optional downstream queue consumed file names are republished to.
    pub republish_queue: Option<String>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub source: EndpointConfig,
    pub dest: EndpointConfig,
    pub transfer: TransferSettings,
    pub queue: QueueSettings,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(key: &str) -> bool {
    matches!(
        env_or(key, "false").to_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

fn endpoint_from_env(prefix: &str, path: String) -> Result<EndpointConfig, anyhow::Error> {
    let var = |key: &str| format!("{}_{}", prefix, key);

    let kind: StorageKind = env_or(&var("STORAGE_TYPE"), "folder").parse()?;

    let ftp = FtpSettings {
        host: env_or(&var("FTP_HOST"), "localhost"),
        user: env_or(&var("FTP_USER"), ""),
        password: env_or(&var("FTP_PASSWORD"), ""),
        port: env_or(&var("FTP_PORT"), "22")
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid port number", var("FTP_PORT")))?,
    };

    let s3 = S3Settings {
        bucket: env_or(&var("AWS_S3_BUCKET_NAME"), ""),
        region: env_or(&var("AWS_S3_REGION"), "eu-west-2"),
        endpoint: env_opt(&var("AWS_S3_HOST")),
        access_key_id: env_opt(&var("AWS_ACCESS_KEY_ID")),
        secret_access_key: env_opt(&var("AWS_SECRET_ACCESS_KEY")),
        use_ambient_creds: env_bool("USE_IAM_CREDS"),
        server_side_encryption: env_bool(&var("AWS_SERVER_SIDE_ENCRYPTION")),
    };

    let redis = RedisSettings {
        host: env_or(&var("REDIS_HOST"), "localhost"),
        port: env_or(&var("REDIS_PORT"), "6379")
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid port number", var("REDIS_PORT")))?,
        password: env_opt(&var("REDIS_PASSWORD")),
    };

    Ok(EndpointConfig {
        kind,
        path,
        ftp,
        s3,
        redis,
    })
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let source = endpoint_from_env("READ", env_or("INGEST_SOURCE_PATH", "tests/files"))?;
        let dest = endpoint_from_env("WRITE", env_or("INGEST_DEST_PATH", "tests/files/done"))?;

        let transfer = TransferSettings {
            batch_size: env_or("MAX_FILES_BATCH", &MAX_FILES_BATCH.to_string())
                .parse()
                .unwrap_or(MAX_FILES_BATCH),
            poll_interval_secs: env_or("PROCESS_INTERVAL", &PROCESS_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(PROCESS_INTERVAL_SECS),
            date_partition: env_bool("FOLDER_DATE_OUTPUT"),
            staging_dir: env_or("TMP_FOLDER_NAME", STAGING_DIR),
            copy_source: env_bool("COPY_FILES"),
            publish_mode: env_bool("WRITE_TO_QUEUE"),
            consume_mode: env_bool("READ_FROM_QUEUE"),
        };

        let queue = QueueSettings {
            host: env_or("RABBIT_MQ_HOST", "localhost"),
            port: env_or("RABBIT_MQ_PORT", "5672")
                .parse()
                .map_err(|_| anyhow::anyhow!("RABBIT_MQ_PORT must be a valid port number"))?,
            username: env_opt("RABBIT_MQ_USERNAME"),
            password: env_opt("RABBIT_MQ_PASSWORD"),
            queue_name: env_or("RABBIT_MQ_QUEUE_NAME", "ingest"),
            max_publish_retries: env_or("RABBIT_MQ_MAX_RETRIES", &RABBIT_MQ_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(RABBIT_MQ_MAX_RETRIES),
            republish_queue: env_opt("RABBIT_MQ_REPUBLISH_QUEUE"),
        };

        Ok(Config {
            source,
            dest,
            transfer,
            queue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        let endpoint = endpoint_from_env("FERRY_TEST_UNSET", "in".to_string()).unwrap();
        assert_eq!(endpoint.kind, StorageKind::Folder);
        assert_eq!(endpoint.path, "in");
        assert_eq!(endpoint.ftp.port, 22);
        assert_eq!(endpoint.redis.port, 6379);
        assert!(!endpoint.s3.server_side_encryption);
    }

    #[test]
    fn invalid_storage_type_is_fatal() {
        std::env::set_var("FERRY_TEST_BAD_STORAGE_TYPE", "teleporter");
        let result = endpoint_from_env("FERRY_TEST_BAD", "in".to_string());
        std::env::remove_var("FERRY_TEST_BAD_STORAGE_TYPE");
        assert!(result.is_err());
    }

    #[test]
    fn bool_envs_accept_common_truthy_values() {
        for value in ["true", "1", "yes", "TRUE"] {
            std::env::set_var("FERRY_TEST_BOOL", value);
            assert!(env_bool("FERRY_TEST_BOOL"), "{} should be truthy", value);
        }
        std::env::set_var("FERRY_TEST_BOOL", "off");
        assert!(!env_bool("FERRY_TEST_BOOL"));
        std::env::remove_var("FERRY_TEST_BOOL");
    }
}
