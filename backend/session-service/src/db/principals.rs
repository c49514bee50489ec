/// Principal credential record operations
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Principal;

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Principal>> {
    let principal = sqlx::query_as::<_, Principal>("SELECT * FROM principals WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(principal)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Principal>> {
    let principal =
        sqlx::query_as::<_, Principal>("SELECT * FROM principals WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(pool)
            .await?;

    Ok(principal)
}

/// Increment the principal's token_version, invalidating every token issued
/// under the prior value. Returns the new version.
pub async fn bump_token_version(pool: &PgPool, id: Uuid) -> Result<i32> {
    let version = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE principals
        SET token_version = token_version + 1,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1
        RETURNING token_version
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(version)
}

/// Record successful login and clear the durable failure mirror
pub async fn record_successful_login(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE principals
        SET last_login_at = CURRENT_TIMESTAMP,
            failed_login_attempts = 0,
            locked_until = NULL
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record failed login attempt and set the durable lockout mirror if the
/// threshold is reached
pub async fn record_failed_login(
    pool: &PgPool,
    id: Uuid,
    max_attempts: i32,
    lock_duration_secs: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE principals
        SET failed_login_attempts = failed_login_attempts + 1,
            locked_until = CASE
                WHEN $2 > 0 AND failed_login_attempts + 1 >= $2
                THEN CURRENT_TIMESTAMP + ($3 || ' seconds')::interval
                ELSE locked_until
            END
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(max_attempts)
    .bind(lock_duration_secs.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Begin TOTP enrollment: store the pending secret
pub async fn begin_totp_enrollment(pool: &PgPool, id: Uuid, secret: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE principals
        SET mfa_method = 'totp',
            mfa_status = 'pending',
            totp_secret = $1,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $2
        "#,
    )
    .bind(secret)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Begin SMS enrollment
pub async fn begin_sms_enrollment(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE principals
        SET mfa_method = 'sms',
            mfa_status = 'pending',
            totp_secret = NULL,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Activate the pending factor after its first successful verification
pub async fn activate_mfa(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE principals
        SET mfa_status = 'active',
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND mfa_status = 'pending'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Disable the factor and clear its secret
pub async fn disable_mfa(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE principals
        SET mfa_method = 'none',
            mfa_status = 'inactive',
            totp_secret = NULL,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Replace the password hash and bump token_version in the same statement so
/// the global revocation cannot be lost between the two writes. Returns the
/// new version.
pub async fn update_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<i32> {
    let version = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE principals
        SET password_hash = $1,
            last_password_change_at = CURRENT_TIMESTAMP,
            token_version = token_version + 1,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $2
        RETURNING token_version
        "#,
    )
    .bind(password_hash)
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(version)
}
