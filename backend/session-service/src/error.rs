use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Token kind mismatch")]
    TokenKindMismatch,

    #[error("Stale token version")]
    StaleTokenVersion,

    #[error("Refresh token replay detected")]
    ReplayDetected,

    #[error("Two-factor code required")]
    TwoFactorRequired,

    #[error("Invalid one-time code")]
    InvalidOneTimeCode,

    #[error("Wrong enrollment state: {0}")]
    EnrollmentState(String),

    #[error("Locked out, retry after {retry_after_secs} seconds")]
    LockedOut { retry_after_secs: u64 },

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable error surface for callers outside this subsystem.
///
/// Every authentication failure collapses to `Unauthorized` so that a caller
/// cannot tell a bad signature from a revoked token from a stale version.
/// Only `LockedOut` carries a retry-after hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    LockedOut { retry_after_secs: u64 },
    TwoFactorRequired,
    EnrollmentState,
    InvalidInput,
    DependencyUnavailable,
    Internal,
}

impl AuthError {
    /// Collapse to the external error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::TokenKindMismatch
            | AuthError::StaleTokenVersion
            | AuthError::ReplayDetected
            | AuthError::InvalidOneTimeCode => ErrorKind::Unauthorized,
            AuthError::LockedOut { retry_after_secs } => ErrorKind::LockedOut {
                retry_after_secs: *retry_after_secs,
            },
            AuthError::TwoFactorRequired => ErrorKind::TwoFactorRequired,
            AuthError::EnrollmentState(_) => ErrorKind::EnrollmentState,
            AuthError::WeakPassword(_) | AuthError::Validation(_) => ErrorKind::InvalidInput,
            AuthError::DependencyUnavailable(_) => ErrorKind::DependencyUnavailable,
            AuthError::Database(_)
            | AuthError::Cache(_)
            | AuthError::Delivery(_)
            | AuthError::Internal(_) => ErrorKind::Internal,
        }
    }
}

// Conversions from external error types
impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        AuthError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!("Redis error: {}", err);
        AuthError::Cache(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    }
}

impl From<code_delivery::DeliveryError> for AuthError {
    fn from(err: code_delivery::DeliveryError) -> Self {
        tracing::error!("Delivery error: {}", err);
        AuthError::Delivery(err.to_string())
    }
}
