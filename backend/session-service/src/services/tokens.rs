/// Token issuance and verification
///
/// Issuance reads the principal's current token_version and mints an
/// access/refresh pair. Verification fails closed: signature, expiry, kind,
/// version, and revocation checks all collapse to the same external
/// unauthorized outcome.
use std::sync::Arc;

use crate::error::{AuthError, Result};
use crate::models::{Principal, TokenKind, TokenPair};
use crate::security::token::{Claims, IssuedToken, TokenSigner};
use crate::services::revocation::RevocationRegistry;
use crate::store::CredentialStore;

/// An access/refresh pair with the claims that went into it.
#[derive(Debug, Clone)]
pub struct IssuedPair {
    pub pair: TokenPair,
    pub access: Claims,
    pub refresh: Claims,
}

pub struct TokenService {
    signer: TokenSigner,
    credentials: Arc<dyn CredentialStore>,
    registry: Arc<RevocationRegistry>,
}

impl TokenService {
    pub fn new(
        signer: TokenSigner,
        credentials: Arc<dyn CredentialStore>,
        registry: Arc<RevocationRegistry>,
    ) -> Self {
        Self {
            signer,
            credentials,
            registry,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Mint an access/refresh pair for a freshly loaded principal.
    pub fn issue_pair(&self, principal: &Principal, remember: bool) -> Result<IssuedPair> {
        let IssuedToken {
            token: access_token,
            claims: access,
        } = self.signer.issue(principal, TokenKind::Access, remember)?;

        let IssuedToken {
            token: refresh_token,
            claims: refresh,
        } = self.signer.issue(principal, TokenKind::Refresh, remember)?;

        let expires_in = access.exp - access.iat;

        Ok(IssuedPair {
            pair: TokenPair {
                access_token,
                refresh_token,
                expires_in,
            },
            access,
            refresh,
        })
    }

    /// Verify a token end to end.
    ///
    /// Valid only when the signature and expiry hold, the kind matches, the
    /// embedded token_version equals the principal's current one, and the
    /// jti is absent from the revocation registry.
    pub async fn verify(&self, token: &str, expected_kind: TokenKind) -> Result<Claims> {
        let claims = self.signer.decode(token, expected_kind)?;
        let principal_id = claims.principal_id()?;

        let principal = self
            .credentials
            .find_by_id(principal_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if claims.token_version != principal.token_version {
            return Err(AuthError::StaleTokenVersion);
        }

        if self.registry.is_revoked(&claims.jti).await? {
            return Err(AuthError::TokenRevoked);
        }

        Ok(claims)
    }
}
