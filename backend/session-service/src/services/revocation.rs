/// Revocation registry
///
/// Dual-store blacklist of token ids. The cache is the fast path, keyed with
/// a TTL equal to the token's remaining lifetime; the durable store is the
/// recovery path when the cache is cold or was flushed. Replication between
/// the two is best-effort with explicit read-through reconciliation, not a
/// transaction.
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{AuthError, Result};
use crate::models::TokenKind;
use crate::store::{RevocationCache, RevocationStore};

/// Floor for cache TTLs so a revocation of an already-expired token still
/// covers clock skew between instances.
const MIN_CACHE_TTL: Duration = Duration::from_secs(60);

/// Bounded exponential backoff for store calls that must not silently fail.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

pub struct RevocationRegistry {
    cache: Arc<dyn RevocationCache>,
    durable: Arc<dyn RevocationStore>,
    retry: RetryPolicy,
}

impl RevocationRegistry {
    pub fn new(cache: Arc<dyn RevocationCache>, durable: Arc<dyn RevocationStore>) -> Self {
        Self {
            cache,
            durable,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn cache_ttl(expires_at: DateTime<Utc>) -> Duration {
        let remaining = (expires_at - Utc::now()).num_seconds();
        if remaining > 0 {
            Duration::from_secs(remaining as u64).max(MIN_CACHE_TTL)
        } else {
            MIN_CACHE_TTL
        }
    }

    /// Blacklist a token until its natural expiry.
    ///
    /// Cache write first (fast path), then the durable write under backoff -
    /// losing a revocation is the dangerous direction, so the durable write
    /// failing after its retry budget is an error even when the cache write
    /// succeeded. A cache write failure alone is survivable: the durable
    /// record heals the cache on the next lookup and lookups fail secure in
    /// the meantime.
    pub async fn revoke(
        &self,
        jti: &str,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let ttl = Self::cache_ttl(expires_at);

        if let Err(err) = self.cache.put(jti, ttl).await {
            warn!(jti = %jti, error = %err, "revocation cache write failed, durable record will heal it");
        }

        self.with_backoff("durable revocation write", || {
            self.durable.insert(jti, kind, expires_at)
        })
        .await?;

        info!(
            jti = %jti,
            kind = kind.as_str(),
            ttl_secs = ttl.as_secs(),
            "token revoked"
        );
        Ok(())
    }

    /// Fail-secure lookup for token verification.
    ///
    /// Cache hit answers immediately. On a miss the durable store decides,
    /// and an unexpired durable record re-populates the cache with the
    /// remaining lifetime. Any transport failure, on either store, reports
    /// the token as revoked rather than risk admitting one that should have
    /// been blocked.
    pub async fn is_revoked(&self, jti: &str) -> Result<bool> {
        match self.lookup(jti).await {
            Ok(revoked) => Ok(revoked),
            Err(err) => {
                warn!(jti = %jti, error = %err, "revocation lookup unavailable, failing secure");
                Ok(true)
            }
        }
    }

    /// Lookup that surfaces store outages instead of failing secure.
    ///
    /// Rotation uses this: an outage must become DependencyUnavailable, not
    /// be mistaken for a replayed token.
    pub async fn check(&self, jti: &str) -> Result<bool> {
        self.lookup(jti).await
    }

    async fn lookup(&self, jti: &str) -> Result<bool> {
        if self
            .with_backoff("revocation cache lookup", || self.cache.contains(jti))
            .await?
        {
            return Ok(true);
        }

        let record = self
            .with_backoff("durable revocation lookup", || {
                self.durable.find_unexpired(jti)
            })
            .await?;

        match record {
            Some(record) => {
                // Heal the cache so the next check stays on the fast path.
                let ttl = Self::cache_ttl(record.expires_at);
                if let Err(err) = self.cache.put(jti, ttl).await {
                    warn!(jti = %jti, error = %err, "failed to re-populate revocation cache");
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Atomically claim a token id for rotation.
    ///
    /// Only the first of two racing claims succeeds; the loser observes
    /// `Ok(false)` and must treat the token as already consumed. On success
    /// the durable record is written and acknowledged before this returns -
    /// callers must not mint replacement tokens until then.
    pub async fn claim(
        &self,
        jti: &str,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let ttl = Self::cache_ttl(expires_at);

        let created = self
            .with_backoff("revocation claim", || self.cache.put_if_absent(jti, ttl))
            .await?;

        if !created {
            return Ok(false);
        }

        self.with_backoff("durable revocation write", || {
            self.durable.insert(jti, kind, expires_at)
        })
        .await?;

        Ok(true)
    }

    /// Purge durable records past their token's natural expiry. Maintenance
    /// only; never called on the request path.
    pub async fn purge_expired(&self) -> Result<u64> {
        let purged = self.durable.purge_expired().await?;
        if purged > 0 {
            info!(purged, "expired revocation records purged");
        }
        Ok(purged)
    }

    async fn with_backoff<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.retry.attempts {
                        warn!(error = %err, what, "retry budget exhausted");
                        return Err(AuthError::DependencyUnavailable(format!("{what}: {err}")));
                    }
                    warn!(error = %err, what, attempt, "transient store failure, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    }
}
