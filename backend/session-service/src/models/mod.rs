pub mod principal;
pub mod token_revocation;

pub use principal::{MfaMethod, MfaStatus, Principal, Role};
pub use token_revocation::RevokedToken;

use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Token kind. Access tokens are short-lived credentials for API calls,
/// refresh tokens are long-lived and only good for rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "token_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// A freshly minted access/refresh pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}
