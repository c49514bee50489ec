//! Store seams for the session subsystem
//!
//! All cross-request coordination lives in these stores so the service can
//! run as multiple stateless instances. Every implementation call carries a
//! timeout; no store call may block the request path indefinitely.

pub mod postgres;
pub mod redis;

pub use postgres::{PgCredentialStore, PgRevocationStore};
pub use redis::{RedisAttemptStore, RedisRevocationCache, SharedConnectionManager};

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::{Principal, RevokedToken, TokenKind};

/// Durable credential records (the Credential Store collaborator).
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>>;
    /// Global revocation event: increment token_version, returning the new
    /// value. Every token issued under the prior value dies with this call.
    async fn bump_token_version(&self, id: Uuid) -> Result<i32>;
    async fn record_login_success(&self, id: Uuid) -> Result<()>;
    async fn record_login_failure(
        &self,
        id: Uuid,
        max_attempts: i32,
        lock_duration_secs: i64,
    ) -> Result<()>;
    async fn begin_totp_enrollment(&self, id: Uuid, secret: &str) -> Result<()>;
    async fn begin_sms_enrollment(&self, id: Uuid) -> Result<()>;
    async fn activate_mfa(&self, id: Uuid) -> Result<()>;
    async fn disable_mfa(&self, id: Uuid) -> Result<()>;
    /// Replace the password hash and bump token_version atomically.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<i32>;
}

/// Fast TTL-keyed side of the revocation registry.
///
/// Presence of a key means revoked. `Err` is a transport/availability
/// failure, never a miss; the registry's fail-secure policy depends on that
/// distinction.
#[async_trait::async_trait]
pub trait RevocationCache: Send + Sync {
    async fn contains(&self, jti: &str) -> Result<bool>;
    async fn put(&self, jti: &str, ttl: Duration) -> Result<()>;
    /// Atomic set-if-absent. `Ok(true)` when this call created the entry,
    /// `Ok(false)` when it already existed.
    async fn put_if_absent(&self, jti: &str, ttl: Duration) -> Result<bool>;
}

/// Durable side of the revocation registry.
#[async_trait::async_trait]
pub trait RevocationStore: Send + Sync {
    async fn insert(&self, jti: &str, kind: TokenKind, expires_at: DateTime<Utc>) -> Result<()>;
    async fn find_unexpired(&self, jti: &str) -> Result<Option<RevokedToken>>;
    async fn purge_expired(&self) -> Result<u64>;
}

/// Failed-attempt counters and lock flags for the brute-force guard.
#[async_trait::async_trait]
pub trait AttemptStore: Send + Sync {
    /// Increment a failure counter and refresh its expiry window.
    /// Returns the new count.
    async fn increment(&self, key: &str, window: Duration) -> Result<i64>;
    /// Remaining lock duration, if the key is locked.
    async fn lock_remaining(&self, key: &str) -> Result<Option<Duration>>;
    async fn set_lock(&self, key: &str, duration: Duration) -> Result<()>;
    async fn clear(&self, keys: &[&str]) -> Result<()>;
}

/// Bound a store call. `on_timeout` picks the error flavor so cache and
/// database deadlines surface through their own taxonomy variants.
pub(crate) async fn with_deadline<T, F>(
    limit: Duration,
    on_timeout: impl FnOnce() -> AuthError,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
