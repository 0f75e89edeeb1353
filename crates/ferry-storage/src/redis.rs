//! Redis key-list storage backend
//!
//! Backed by one ordered list under a single configured key. Stores file
//! names only, never content. It acts as a manifest, not a byte store, so
//! `read` is unsupported and there is no staging or promotion.

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client};
use async_trait::async_trait;
use ferry_core::{RedisSettings, StorageKind};

use crate::traits::{validate_name, Storage, StorageError, StorageResult};

pub struct RedisStorage {
    key: String,
    conn: MultiplexedConnection,
}

impl RedisStorage {
    /// Open a connection; the endpoint's configured path is the list key.
    pub async fn connect(settings: &RedisSettings, key: &str) -> StorageResult<Self> {
        let url = match &settings.password {
            Some(password) => {
                format!("redis://:{}@{}:{}/", password, settings.host, settings.port)
            }
            None => format!("redis://{}:{}/", settings.host, settings.port),
        };

        let client = Client::open(url).map_err(|e| {
            StorageError::Config(format!(
                "invalid redis connection settings for {}:{}: {}",
                settings.host, settings.port, e
            ))
        })?;

        let conn = client.get_multiplexed_async_connection().await.map_err(|e| {
            StorageError::Config(format!(
                "failed to connect to redis at {}:{}: {}",
                settings.host, settings.port, e
            ))
        })?;

        tracing::info!(host = %settings.host, key = %key, "Connected to redis");

        Ok(RedisStorage {
            key: key.to_string(),
            conn,
        })
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.lrange(&self.key, 0, -1).await.map_err(|e| {
            tracing::error!(backend = "redis", key = %self.key, error = %e, "Failed to read list");
            StorageError::List(format!("{}: {}", self.key, e))
        })
    }

    async fn read(&self, _name: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::Unsupported("read"))
    }

    /// Conditional append: a name already present in the list is left alone.
    /// This is the backend's sole idempotence guarantee; the content bytes
    /// are ignored.
    async fn write(&self, name: &str, _content: &[u8]) -> StorageResult<()> {
        validate_name(name)?;
        let mut conn = self.conn.clone();

        let existing: Vec<String> = conn.lrange(&self.key, 0, -1).await.map_err(|e| {
            StorageError::Write(format!("{}: {}", self.key, e))
        })?;

        if existing.iter().any(|entry| entry == name) {
            tracing::debug!(backend = "redis", key = %self.key, file = %name, "Name already listed, skipping append");
            return Ok(());
        }

        let _: i64 = conn.rpush(&self.key, name).await.map_err(|e| {
            tracing::error!(backend = "redis", key = %self.key, file = %name, error = %e, "Failed to append name");
            StorageError::Write(format!("{}: {}", self.key, e))
        })?;

        tracing::debug!(backend = "redis", key = %self.key, file = %name, "Appended name");
        Ok(())
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        let mut conn = self.conn.clone();

        let removed: i64 = conn.lrem(&self.key, 1, name).await.map_err(|e| {
            tracing::error!(backend = "redis", key = %self.key, file = %name, error = %e, "Failed to remove name");
            StorageError::Delete(format!("{}: {}", self.key, e))
        })?;

        if removed == 0 {
            tracing::warn!(backend = "redis", key = %self.key, file = %name, "Name for removal was not listed");
        }

        Ok(())
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Redis
    }
}
