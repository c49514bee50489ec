/// Redis-backed store implementations
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{with_deadline, AttemptStore, RevocationCache};
use crate::error::{AuthError, Result};

/// Shared Redis connection manager guarded by a Tokio mutex.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

fn cache_timeout() -> AuthError {
    AuthError::Cache("command timed out".to_string())
}

fn revocation_key(jti: &str) -> String {
    format!("revocation:{jti}")
}

/// TTL-keyed revocation entries. Presence means revoked; the entry expires
/// with the token itself.
#[derive(Clone)]
pub struct RedisRevocationCache {
    redis: SharedConnectionManager,
    timeout: Duration,
}

impl RedisRevocationCache {
    pub fn new(redis: SharedConnectionManager, timeout: Duration) -> Self {
        Self { redis, timeout }
    }
}

#[async_trait::async_trait]
impl RevocationCache for RedisRevocationCache {
    async fn contains(&self, jti: &str) -> Result<bool> {
        let key = revocation_key(jti);
        let mut conn = self.redis.lock().await.clone();

        with_deadline(self.timeout, cache_timeout, async move {
            let exists: bool = redis::cmd("EXISTS")
                .arg(&key)
                .query_async(&mut conn)
                .await?;
            Ok(exists)
        })
        .await
    }

    async fn put(&self, jti: &str, ttl: Duration) -> Result<()> {
        let key = revocation_key(jti);
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.redis.lock().await.clone();

        with_deadline(self.timeout, cache_timeout, async move {
            redis::cmd("SET")
                .arg(&key)
                .arg("1")
                .arg("EX")
                .arg(ttl_secs)
                .query_async::<_, ()>(&mut conn)
                .await?;
            Ok(())
        })
        .await
    }

    async fn put_if_absent(&self, jti: &str, ttl: Duration) -> Result<bool> {
        let key = revocation_key(jti);
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.redis.lock().await.clone();

        with_deadline(self.timeout, cache_timeout, async move {
            // SET NX answers OK when the key was created, nil when it already
            // existed - the first of two racing writers wins.
            let created: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg("1")
                .arg("EX")
                .arg(ttl_secs)
                .arg("NX")
                .query_async(&mut conn)
                .await?;
            Ok(created.is_some())
        })
        .await
    }
}

/// Failure counters and lock flags with explicit TTLs.
#[derive(Clone)]
pub struct RedisAttemptStore {
    redis: SharedConnectionManager,
    timeout: Duration,
}

impl RedisAttemptStore {
    pub fn new(redis: SharedConnectionManager, timeout: Duration) -> Self {
        Self { redis, timeout }
    }
}

#[async_trait::async_trait]
impl AttemptStore for RedisAttemptStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<i64> {
        let key = key.to_string();
        let window_secs = window.as_secs().max(1);
        let mut conn = self.redis.lock().await.clone();

        with_deadline(self.timeout, cache_timeout, async move {
            let count: i64 = redis::cmd("INCR").arg(&key).query_async(&mut conn).await?;
            redis::cmd("EXPIRE")
                .arg(&key)
                .arg(window_secs)
                .query_async::<_, i64>(&mut conn)
                .await?;
            Ok(count)
        })
        .await
    }

    async fn lock_remaining(&self, key: &str) -> Result<Option<Duration>> {
        let key = key.to_string();
        let mut conn = self.redis.lock().await.clone();

        with_deadline(self.timeout, cache_timeout, async move {
            let pttl: i64 = redis::cmd("PTTL").arg(&key).query_async(&mut conn).await?;
            // -2 = no key, -1 = key without expiry (locks always carry one)
            if pttl > 0 {
                Ok(Some(Duration::from_millis(pttl as u64)))
            } else if pttl == -1 {
                Ok(Some(Duration::ZERO))
            } else {
                Ok(None)
            }
        })
        .await
    }

    async fn set_lock(&self, key: &str, duration: Duration) -> Result<()> {
        let key = key.to_string();
        let secs = duration.as_secs().max(1);
        let mut conn = self.redis.lock().await.clone();

        with_deadline(self.timeout, cache_timeout, async move {
            redis::cmd("SET")
                .arg(&key)
                .arg("1")
                .arg("EX")
                .arg(secs)
                .query_async::<_, ()>(&mut conn)
                .await?;
            Ok(())
        })
        .await
    }

    async fn clear(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let mut conn = self.redis.lock().await.clone();

        with_deadline(self.timeout, cache_timeout, async move {
            let mut cmd = redis::cmd("DEL");
            for key in &keys {
                cmd.arg(key);
            }
            cmd.query_async::<_, i64>(&mut conn).await?;
            Ok(())
        })
        .await
    }
}
