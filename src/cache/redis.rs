//! Redis-backed override store
//!
//! Lets several broker instances share webhook overrides. Values are stored
//! as JSON under `payments:status_override:{payment_id}` without a TTL, so
//! the store behaves like the in-memory one across restarts.

use super::{CacheError, CacheResult, PaymentStatusOverride, StatusOverrideStore};
use ::redis::AsyncCommands;
use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub type RedisPool = Pool<RedisConnectionManager>;

type RedisConnection<'a> = PooledConnection<'a, RedisConnectionManager>;

const KEY_PREFIX: &str = "payments:status_override";

#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    pub redis_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 20,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

pub async fn init_pool(config: RedisPoolConfig) -> CacheResult<RedisPool> {
    info!(
        "Initializing Redis override store pool: max_connections={}",
        config.max_connections
    );

    let manager = RedisConnectionManager::new(config.redis_url.clone()).map_err(|e| {
        error!("Failed to create Redis connection manager: {}", e);
        CacheError::ConnectionError(e.to_string())
    })?;

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(config.connection_timeout)
        .build(manager)
        .await
        .map_err(|e| {
            error!("Failed to build Redis connection pool: {}", e);
            CacheError::ConnectionError(e.to_string())
        })?;

    if let Err(e) = ping(&pool).await {
        warn!("Initial Redis connection test failed, but continuing: {}", e);
    }

    Ok(pool)
}

async fn ping(pool: &RedisPool) -> CacheResult<()> {
    let mut conn = pool.get().await?;
    let _: String = ::redis::cmd("PING").query_async(&mut *conn).await?;
    Ok(())
}

pub fn override_key(payment_id: &str) -> String {
    format!("{}:{}", KEY_PREFIX, payment_id)
}

#[derive(Clone)]
pub struct RedisStatusStore {
    pool: RedisPool,
}

impl RedisStatusStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> CacheResult<RedisConnection<'_>> {
        self.pool.get().await.map_err(|e| {
            warn!("Failed to get Redis connection: {}", e);
            e.into()
        })
    }
}

#[async_trait]
impl StatusOverrideStore for RedisStatusStore {
    async fn set(&self, payment_id: &str, status: &str) -> CacheResult<PaymentStatusOverride> {
        let entry = PaymentStatusOverride::new(payment_id, status);
        let json = serde_json::to_string(&entry)?;

        let mut conn = self.connection().await?;
        let _: () = conn.set(override_key(payment_id), json).await.map_err(|e| {
            warn!("Redis SET failed for payment '{}': {}", payment_id, e);
            CacheError::from(e)
        })?;

        debug!("Status override stored in Redis: payment_id={}", payment_id);
        Ok(entry)
    }

    async fn get(&self, payment_id: &str) -> CacheResult<Option<PaymentStatusOverride>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(override_key(payment_id)).await.map_err(|e| {
            warn!("Redis GET failed for payment '{}': {}", payment_id, e);
            CacheError::from(e)
        })?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn health_check(&self) -> CacheResult<()> {
        ping(&self.pool).await
    }
}
