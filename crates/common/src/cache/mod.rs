//! Redis response cache
//!
//! Caching is best-effort and optional: when no Redis address is
//! configured, or the initial connection fails, the server runs without a
//! cache and every lookup falls through to PostgreSQL. Consumers treat a
//! populated `Option<Arc<Cache>>` as a hint, never a requirement.

use crate::config::RedisConfig;
use crate::errors::{AppError, Result};
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Redis cache client backed by an auto-reconnecting connection manager
pub struct Cache {
    connection: ConnectionManager,
    default_ttl_secs: u64,
    key_prefix: String,
}

impl Cache {
    /// Connect to Redis at the given URL
    pub async fn new(url: &str, default_ttl_secs: u64) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection =
            client
                .get_connection_manager()
                .await
                .map_err(|e| AppError::CacheError {
                    message: format!("Failed to connect to Redis: {}", e),
                })?;

        Ok(Self {
            connection,
            default_ttl_secs,
            key_prefix: "tenon".to_string(),
        })
    }

    /// Connect from config; `None` when caching is unconfigured or Redis
    /// is unreachable at startup
    pub async fn from_config(config: &RedisConfig) -> Option<Arc<Cache>> {
        let url = config.url()?;
        match Cache::new(&url, config.default_ttl_secs).await {
            Ok(cache) => {
                info!("Response cache connected");
                Some(Arc::new(cache))
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable, continuing without cache");
                None
            }
        }
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = self.key(key);
        let mut conn = self.connection.clone();

        let value: Option<String> =
            conn.get(&full_key)
                .await
                .map_err(|e| AppError::CacheError {
                    message: format!("Failed to get key '{}': {}", full_key, e),
                })?;

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| AppError::CacheError {
                    message: format!("Failed to parse cached value: {}", e),
                })?;
                debug!(key = %full_key, "Cache hit");
                Ok(Some(parsed))
            }
            None => {
                debug!(key = %full_key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Set a value with the default TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.default_ttl_secs).await
    }

    /// Set a value with a custom TTL
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<()> {
        let full_key = self.key(key);
        let json = serde_json::to_string(value).map_err(|e| AppError::CacheError {
            message: format!("Failed to serialize value: {}", e),
        })?;

        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(&full_key, &json, ttl_secs)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to set key '{}': {}", full_key, e),
            })?;

        debug!(key = %full_key, ttl_secs, "Cache set");
        Ok(())
    }

    /// Delete a key; returns whether it existed
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let full_key = self.key(key);
        let mut conn = self.connection.clone();

        let deleted: i32 = conn
            .del(&full_key)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to delete key '{}': {}", full_key, e),
            })?;

        Ok(deleted > 0)
    }

    /// Get or compute with a loader; a failed cache write is logged and
    /// the loaded value returned anyway
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, ttl_secs: u64, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get::<T>(key).await.unwrap_or(None) {
            return Ok(cached);
        }

        let value = loader().await?;

        if let Err(e) = self.set_with_ttl(key, &value, ttl_secs).await {
            warn!(error = %e, "Failed to cache value, continuing without cache");
        }

        Ok(value)
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

/// Cache key builder helpers
pub mod keys {
    use uuid::Uuid;

    /// Platform-wide tenant/user statistics
    pub fn platform_stats() -> String {
        "platform:stats".to_string()
    }

    /// Per-family record statistics inside a tenant
    pub fn resource_stats(tenant_id: Uuid, family: &str) -> String {
        format!("stats:{}:{}", tenant_id, family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builders() {
        let tenant_id = uuid::Uuid::new_v4();

        assert_eq!(keys::platform_stats(), "platform:stats");
        let stats_key = keys::resource_stats(tenant_id, "policies");
        assert!(stats_key.starts_with("stats:"));
        assert!(stats_key.ends_with(":policies"));
    }
}
