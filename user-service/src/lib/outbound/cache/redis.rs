use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::Config;
use deadpool_redis::Connection;
use deadpool_redis::Pool;
use deadpool_redis::PoolConfig;
use deadpool_redis::Runtime;
use deadpool_redis::Timeouts;

use crate::user::errors::CacheError;
use crate::user::ports::UserCache;

/// Redis-backed cache. Expiry is delegated to Redis via `SET EX`.
pub struct RedisUserCache {
    pool: Pool,
}

impl RedisUserCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a connection pool for `url`.
    ///
    /// No connection is opened until the first command. Waiting for, opening
    /// and recycling a pooled connection are each bounded by `timeout`.
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let mut config = Config::from_url(url);
        config.pool = Some(PoolConfig {
            timeouts: Timeouts {
                wait: Some(timeout),
                create: Some(timeout),
                recycle: Some(timeout),
            },
            ..PoolConfig::default()
        });

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
        Ok(Self::new(pool))
    }

    async fn connection(&self) -> Result<Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl UserCache for RedisUserCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| CacheError::CommandFailed(e.to_string()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        // Redis rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);

        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| CacheError::CommandFailed(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CacheError::CommandFailed(e.to_string()))
    }
}
