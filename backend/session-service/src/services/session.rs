/// Login and session lifecycle orchestration
///
/// Login order: brute-force guard, credential lookup, password verify,
/// multi-factor challenge, token issuance. Bad credentials, unknown
/// accounts, and revoked tokens all collapse to the same external outcome.
use chrono::DateTime;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::{TokenKind, TokenPair};
use crate::security::password::{hash_password, verify_password};
use crate::services::lockout::{BruteForceGuard, LockoutChannel, LockoutPolicy};
use crate::services::revocation::RevocationRegistry;
use crate::services::tokens::TokenService;
use crate::services::two_factor::TwoFactorService;
use crate::store::CredentialStore;

pub struct SessionService {
    credentials: Arc<dyn CredentialStore>,
    guard: Arc<BruteForceGuard>,
    tokens: Arc<TokenService>,
    two_factor: Arc<TwoFactorService>,
    registry: Arc<RevocationRegistry>,
    login_policy: LockoutPolicy,
}

impl SessionService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        guard: Arc<BruteForceGuard>,
        tokens: Arc<TokenService>,
        two_factor: Arc<TwoFactorService>,
        registry: Arc<RevocationRegistry>,
        login_policy: LockoutPolicy,
    ) -> Self {
        Self {
            credentials,
            guard,
            tokens,
            two_factor,
            registry,
            login_policy,
        }
    }

    fn login_subject(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Authenticate a principal and mint a token pair.
    ///
    /// The lockout key is the submitted identifier, so unknown identifiers
    /// accrue lockout state exactly like real ones and the response never
    /// says which kind it was.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        one_time_code: Option<&str>,
        remember: bool,
    ) -> Result<TokenPair> {
        let subject = Self::login_subject(email);

        self.guard
            .ensure_not_locked(LockoutChannel::Login, &subject)
            .await?;

        let Some(principal) = self.credentials.find_by_email(&subject).await? else {
            self.guard
                .record_failure(LockoutChannel::Login, &subject)
                .await?;
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &principal.password_hash)? {
            self.guard
                .record_failure(LockoutChannel::Login, &subject)
                .await?;
            self.credentials
                .record_login_failure(
                    principal.id,
                    self.login_policy.max_failures as i32,
                    self.login_policy.lockout.as_secs() as i64,
                )
                .await?;
            return Err(AuthError::InvalidCredentials);
        }

        if principal.mfa_active() {
            let Some(code) = one_time_code else {
                return Err(AuthError::TwoFactorRequired);
            };
            self.two_factor.verify_challenge(&principal, code).await?;
        }

        self.guard
            .record_success(LockoutChannel::Login, &subject)
            .await?;
        self.credentials.record_login_success(principal.id).await?;

        let issued = self.tokens.issue_pair(&principal, remember)?;

        info!(principal_id = %principal.id, "principal logged in");

        Ok(issued.pair)
    }

    /// Dispatch an SMS login challenge for the identifier, if it belongs to
    /// an SMS-enrolled principal. Always answers uniformly so the call
    /// cannot be used to probe which accounts exist.
    pub async fn request_sms_challenge(&self, email: &str) -> Result<()> {
        let subject = Self::login_subject(email);

        match self.credentials.find_by_email(&subject).await? {
            Some(principal) if principal.mfa_active() => {
                if let Err(err) = self.two_factor.send_challenge(&principal).await {
                    warn!(principal_id = %principal.id, error = %err, "login challenge dispatch failed");
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// End the presented session: verify the access token, then revoke both
    /// tokens individually.
    pub async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        let access = self.tokens.verify(access_token, TokenKind::Access).await?;
        let expires_at = DateTime::from_timestamp(access.exp, 0)
            .ok_or_else(|| AuthError::Internal("token expiry out of range".to_string()))?;

        self.registry
            .revoke(&access.jti, TokenKind::Access, expires_at)
            .await?;

        if let Some(refresh_token) = refresh_token {
            // Best-effort: a malformed or foreign refresh token does not
            // un-do the logout of the access token.
            match self
                .tokens
                .signer()
                .decode(refresh_token, TokenKind::Refresh)
            {
                Ok(refresh) if refresh.sub == access.sub => {
                    let refresh_expiry = DateTime::from_timestamp(refresh.exp, 0)
                        .ok_or_else(|| {
                            AuthError::Internal("token expiry out of range".to_string())
                        })?;
                    self.registry
                        .revoke(&refresh.jti, TokenKind::Refresh, refresh_expiry)
                        .await?;
                }
                Ok(_) => {
                    warn!(principal_id = %access.sub, "logout presented a refresh token for another principal");
                }
                Err(_) => {}
            }
        }

        info!(principal_id = %access.sub, "principal logged out");
        Ok(())
    }

    /// "Log out everywhere": bump the version counter, instantly
    /// invalidating every outstanding token without touching the registry.
    pub async fn logout_everywhere(&self, principal_id: Uuid) -> Result<i32> {
        let token_version = self.credentials.bump_token_version(principal_id).await?;

        warn!(
            principal_id = %principal_id,
            token_version,
            "all sessions revoked"
        );

        Ok(token_version)
    }

    /// Change the password. The hash swap and the version bump are one
    /// statement, so every existing session dies with the old password.
    pub async fn change_password(
        &self,
        principal_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let principal = self
            .credentials
            .find_by_id(principal_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(current_password, &principal.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = hash_password(new_password)?;
        let token_version = self
            .credentials
            .update_password(principal.id, &password_hash)
            .await?;

        warn!(
            principal_id = %principal.id,
            token_version,
            "password changed, all sessions must re-authenticate"
        );

        Ok(())
    }
}
