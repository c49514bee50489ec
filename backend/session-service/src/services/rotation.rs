/// Refresh-rotation protocol
///
/// Exchanges a valid refresh token for a fresh access/refresh pair,
/// consuming the old one. Reuse of an already-consumed token is treated as
/// token theft and revokes the whole family via the version counter - that
/// escalation is what separates rotation from simple renewal.
use chrono::DateTime;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AuthError, Result};
use crate::models::{TokenKind, TokenPair};
use crate::security::token::Claims;
use crate::services::revocation::RevocationRegistry;
use crate::services::tokens::TokenService;
use crate::store::CredentialStore;

pub struct RotationService {
    tokens: Arc<TokenService>,
    registry: Arc<RevocationRegistry>,
    credentials: Arc<dyn CredentialStore>,
}

impl RotationService {
    pub fn new(
        tokens: Arc<TokenService>,
        registry: Arc<RevocationRegistry>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            tokens,
            registry,
            credentials,
        }
    }

    /// Rotate a refresh token. Each step is a hard precondition for the
    /// next; new tokens are minted only after the consumed token's
    /// revocation is durably acknowledged.
    pub async fn rotate(&self, old_refresh: &str) -> Result<TokenPair> {
        let claims = self
            .tokens
            .signer()
            .decode(old_refresh, TokenKind::Refresh)?;
        let principal_id = claims.principal_id()?;

        let principal = self
            .credentials
            .find_by_id(principal_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        // A stale version means the family is already dead; nothing to
        // escalate.
        if claims.token_version != principal.token_version {
            return Err(AuthError::StaleTokenVersion);
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::Internal("token expiry out of range".to_string()))?;

        // An outage here surfaces as DependencyUnavailable rather than being
        // mistaken for a replay.
        if self.registry.check(&claims.jti).await? {
            return self.escalate_replay(&claims).await;
        }

        // Atomic consume: of two racing rotations of the same token, exactly
        // one claims it; the other lands in the replay path.
        if !self
            .registry
            .claim(&claims.jti, TokenKind::Refresh, expires_at)
            .await?
        {
            return self.escalate_replay(&claims).await;
        }

        let issued = self.tokens.issue_pair(&principal, claims.rem)?;

        info!(
            principal_id = %principal.id,
            consumed_jti = %claims.jti,
            "refresh token rotated"
        );

        Ok(issued.pair)
    }

    /// Replay of a consumed refresh token: revoke the entire token family by
    /// bumping the version counter, then report the same unauthorized
    /// outcome as any other bad token.
    async fn escalate_replay(&self, claims: &Claims) -> Result<TokenPair> {
        let principal_id = claims.principal_id()?;

        let token_version = self.credentials.bump_token_version(principal_id).await?;

        warn!(
            principal_id = %principal_id,
            jti = %claims.jti,
            token_version,
            "consumed refresh token replayed, token family revoked"
        );

        Err(AuthError::ReplayDetected)
    }
}
