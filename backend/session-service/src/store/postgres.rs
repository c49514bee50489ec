/// Postgres-backed store implementations
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use super::{with_deadline, CredentialStore, RevocationStore};
use crate::db;
use crate::error::{AuthError, Result};
use crate::models::{Principal, RevokedToken, TokenKind};

fn db_timeout() -> AuthError {
    AuthError::Database("statement timed out".to_string())
}

/// Credential store over the principals table.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait::async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>> {
        with_deadline(self.timeout, db_timeout, db::principals::find_by_id(&self.pool, id)).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>> {
        with_deadline(
            self.timeout,
            db_timeout,
            db::principals::find_by_email(&self.pool, email),
        )
        .await
    }

    async fn bump_token_version(&self, id: Uuid) -> Result<i32> {
        with_deadline(
            self.timeout,
            db_timeout,
            db::principals::bump_token_version(&self.pool, id),
        )
        .await
    }

    async fn record_login_success(&self, id: Uuid) -> Result<()> {
        with_deadline(
            self.timeout,
            db_timeout,
            db::principals::record_successful_login(&self.pool, id),
        )
        .await
    }

    async fn record_login_failure(
        &self,
        id: Uuid,
        max_attempts: i32,
        lock_duration_secs: i64,
    ) -> Result<()> {
        with_deadline(
            self.timeout,
            db_timeout,
            db::principals::record_failed_login(&self.pool, id, max_attempts, lock_duration_secs),
        )
        .await
    }

    async fn begin_totp_enrollment(&self, id: Uuid, secret: &str) -> Result<()> {
        with_deadline(
            self.timeout,
            db_timeout,
            db::principals::begin_totp_enrollment(&self.pool, id, secret),
        )
        .await
    }

    async fn begin_sms_enrollment(&self, id: Uuid) -> Result<()> {
        with_deadline(
            self.timeout,
            db_timeout,
            db::principals::begin_sms_enrollment(&self.pool, id),
        )
        .await
    }

    async fn activate_mfa(&self, id: Uuid) -> Result<()> {
        with_deadline(
            self.timeout,
            db_timeout,
            db::principals::activate_mfa(&self.pool, id),
        )
        .await
    }

    async fn disable_mfa(&self, id: Uuid) -> Result<()> {
        with_deadline(
            self.timeout,
            db_timeout,
            db::principals::disable_mfa(&self.pool, id),
        )
        .await
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<i32> {
        with_deadline(
            self.timeout,
            db_timeout,
            db::principals::update_password(&self.pool, id, password_hash),
        )
        .await
    }
}

/// Durable revocation store over the token_revocation table.
#[derive(Clone)]
pub struct PgRevocationStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgRevocationStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait::async_trait]
impl RevocationStore for PgRevocationStore {
    async fn insert(&self, jti: &str, kind: TokenKind, expires_at: DateTime<Utc>) -> Result<()> {
        with_deadline(
            self.timeout,
            db_timeout,
            db::token_revocation::insert_revocation(&self.pool, jti, kind, expires_at),
        )
        .await
    }

    async fn find_unexpired(&self, jti: &str) -> Result<Option<RevokedToken>> {
        with_deadline(
            self.timeout,
            db_timeout,
            db::token_revocation::find_unexpired(&self.pool, jti),
        )
        .await
    }

    async fn purge_expired(&self) -> Result<u64> {
        with_deadline(
            self.timeout,
            db_timeout,
            db::token_revocation::cleanup_expired(&self.pool),
        )
        .await
    }
}
