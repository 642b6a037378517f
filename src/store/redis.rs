//! Redis-backed ephemeral store
//!
//! The legacy deployment keeps all ceremony state in Redis; this backend
//! speaks the same key/value layout so both systems can run against one
//! instance. Redis should be configured with authentication and encryption in
//! transit, and ACLs can restrict access to the ceremony key namespaces.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::warn;

use super::{EphemeralStore, StoreError};

/// Redis client wrapper implementing [`EphemeralStore`]
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    /// Create a store from a Redis URL, e.g. `redis://localhost:6379`
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid Redis URL: {e}")))?;
        Ok(Self { client })
    }

    /// Get a multiplexed connection, retrying transient failures
    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        let mut backoff_ms = 100u64;
        for attempt in 1..=3 {
            match self.client.get_multiplexed_async_connection().await {
                Ok(conn) => return Ok(conn),
                Err(e) if attempt < 3 => {
                    warn!(attempt, backoff_ms, "Redis connection failed, retrying: {e}");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
                Err(e) => return Err(StoreError::Unavailable(e.to_string())),
            }
        }
        unreachable!()
    }
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        match ttl {
            Some(ttl) => {
                // SETEX has whole-second resolution; round sub-second TTLs up
                let secs = ttl.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, secs)
                    .await
                    .map_err(|e| StoreError::Operation(e.to_string()))
            }
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| StoreError::Operation(e.to_string())),
        }
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn
            .del(key)
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;
        Ok(removed > 0)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection().await?;
        conn.incr(key, 1i64)
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}
