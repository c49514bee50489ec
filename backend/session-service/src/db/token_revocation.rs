/// Durable revocation record operations
///
/// The durable side of the revocation registry. Source of truth when the
/// cache is cold or was flushed.
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::{RevokedToken, TokenKind};

/// Record a revoked token. Idempotent on jti.
pub async fn insert_revocation(
    pool: &PgPool,
    jti: &str,
    kind: TokenKind,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO token_revocation (jti, kind, expires_at, revoked_at)
        VALUES ($1, $2, $3, CURRENT_TIMESTAMP)
        ON CONFLICT (jti) DO UPDATE SET
            kind = EXCLUDED.kind,
            expires_at = EXCLUDED.expires_at
        "#,
    )
    .bind(jti)
    .bind(kind)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Look up a revocation record that is still within the token's lifetime
pub async fn find_unexpired(pool: &PgPool, jti: &str) -> Result<Option<RevokedToken>> {
    let record = sqlx::query_as::<_, RevokedToken>(
        r#"
        SELECT jti, kind, expires_at, revoked_at
        FROM token_revocation
        WHERE jti = $1 AND expires_at > NOW()
        "#,
    )
    .bind(jti)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Delete revocation records past their token's natural expiry (maintenance
/// operation, not part of the request path)
pub async fn cleanup_expired(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM token_revocation
        WHERE expires_at < NOW()
        "#,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
