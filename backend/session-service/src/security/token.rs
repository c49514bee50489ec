/// Bearer token minting and decoding
///
/// Claims are a fixed record so every issuance site populates every field.
/// Decoding checks signature, expiry, issuer, and kind only; revocation and
/// version checks happen in the token service, which has store access.
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{JwtSettings, PolicySettings};
use crate::error::{AuthError, Result};
use crate::models::{Principal, Role, TokenKind};

/// Signed claim set carried by every token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id (UUID string)
    pub sub: String,
    pub role: Role,
    /// Principal's token_version at issuance time
    pub token_version: i32,
    /// Unique token id, random per token, never content-derived
    pub jti: String,
    pub token_type: TokenKind,
    /// Remember-me flag; extends the refresh lifetime across rotations
    #[serde(default)]
    pub rem: bool,
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn principal_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken)
    }

    /// Seconds until this token's natural expiry.
    pub fn remaining_secs(&self) -> i64 {
        self.exp - Utc::now().timestamp()
    }
}

/// A serialized token together with its decoded claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Mints and decodes signed bearer tokens (HS256).
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
    remember_me_ttl_secs: u64,
}

impl TokenSigner {
    pub fn new(jwt: &JwtSettings, policy: &PolicySettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt.secret.as_bytes()),
            issuer: jwt.issuer.clone(),
            access_ttl_secs: policy.access_token_ttl_secs,
            refresh_ttl_secs: policy.refresh_token_ttl_secs,
            remember_me_ttl_secs: policy.remember_me_ttl_secs,
        }
    }

    fn lifetime_secs(&self, kind: TokenKind, remember: bool) -> u64 {
        match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => {
                if remember {
                    self.remember_me_ttl_secs
                } else {
                    self.refresh_ttl_secs
                }
            }
        }
    }

    /// Mint a token for `principal`. No side effects beyond signing.
    pub fn issue(
        &self,
        principal: &Principal,
        kind: TokenKind,
        remember: bool,
    ) -> Result<IssuedToken> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal.id.to_string(),
            role: principal.role,
            token_version: principal.token_version,
            jti: Uuid::new_v4().to_string(),
            token_type: kind,
            rem: remember,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + self.lifetime_secs(kind, remember) as i64,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;

        Ok(IssuedToken { token, claims })
    }

    /// Decode and validate signature, expiry, issuer, and kind.
    pub fn decode(&self, token: &str, expected_kind: TokenKind) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        if data.claims.token_type != expected_kind {
            return Err(AuthError::TokenKindMismatch);
        }

        Ok(data.claims)
    }
}
