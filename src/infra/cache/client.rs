//! Redis client wrapper.

use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};

use common::{AppError, AppResult, CacheConfig};

/// Redis cache wrapper with a multiplexed managed connection.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
}

impl Cache {
    /// Connect to redis. The configured logical database is appended to
    /// the URL when non-zero.
    pub async fn connect(config: &CacheConfig) -> Result<Self, RedisError> {
        let url = if config.db != 0 {
            format!("{}/{}", config.url.trim_end_matches('/'), config.db)
        } else {
            config.url.clone()
        };

        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        tracing::info!("Redis cache connected");

        Ok(Self { connection })
    }

    /// Get a JSON-encoded value. Missing key yields `CacheMiss`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<T> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(cache_error)?;

        match value {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                tracing::error!(key, error = %e, "failed to decode cache value");
                AppError::Internal
            }),
            None => {
                tracing::debug!(key, "cache miss");
                Err(AppError::CacheMiss)
            }
        }
    }

    /// Set a JSON-encoded value with a TTL in seconds.
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(value).map_err(|e| {
            tracing::error!(key, error = %e, "failed to encode cache value");
            AppError::Internal
        })?;

        conn.set_ex::<_, _, ()>(key, json, ttl_seconds)
            .await
            .map_err(cache_error)?;

        Ok(())
    }

    /// Delete a key. Deleting a missing key is not an error.
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await.map_err(cache_error)?;
        Ok(())
    }
}

/// Convert a redis transport error. Never `CacheMiss`.
fn cache_error(e: RedisError) -> AppError {
    tracing::error!(error = %e, "redis error");
    AppError::Internal
}
