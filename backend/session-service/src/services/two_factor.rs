/// Multi-factor challenge manager
///
/// Enrollment state machine per principal: inactive -> pending -> active.
/// Only the first successful verification of a pending factor activates it,
/// and only an active factor is honored at login. Disabling requires a fresh
/// successful verification and re-authenticates every session via the
/// version counter.
use code_delivery::{CodeCheck, CodeDelivery, DeliveryChannel, Dispatch};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::{MfaMethod, MfaStatus, Principal};
use crate::security::totp::TotpGenerator;
use crate::services::lockout::{BruteForceGuard, LockoutChannel};
use crate::store::CredentialStore;

/// Response payload for starting TOTP enrollment
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    pub secret: String,
    pub provisioning_uri: String,
}

pub struct TwoFactorService {
    credentials: Arc<dyn CredentialStore>,
    guard: Arc<BruteForceGuard>,
    delivery: Arc<dyn CodeDelivery>,
    issuer_label: String,
    totp_step_secs: u64,
}

impl TwoFactorService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        guard: Arc<BruteForceGuard>,
        delivery: Arc<dyn CodeDelivery>,
        issuer_label: String,
        totp_step_secs: u64,
    ) -> Self {
        Self {
            credentials,
            guard,
            delivery,
            issuer_label,
            totp_step_secs,
        }
    }

    async fn load(&self, principal_id: Uuid) -> Result<Principal> {
        self.credentials
            .find_by_id(principal_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }

    /// Begin TOTP enrollment. Repeating the call while still pending
    /// restarts enrollment with a fresh secret.
    pub async fn enroll_totp(&self, principal_id: Uuid) -> Result<TotpEnrollment> {
        let principal = self.load(principal_id).await?;

        if principal.mfa_status == MfaStatus::Active {
            return Err(AuthError::EnrollmentState(
                "a factor is already active; disable it first".to_string(),
            ));
        }

        let (secret, provisioning_uri) =
            TotpGenerator::generate_secret_and_uri(&principal.email, &self.issuer_label);

        self.credentials
            .begin_totp_enrollment(principal.id, &secret)
            .await?;

        info!(principal_id = %principal.id, "TOTP enrollment started");

        Ok(TotpEnrollment {
            secret,
            provisioning_uri,
        })
    }

    /// Begin SMS enrollment. Requires a verified phone number on file; the
    /// enrollment code is dispatched through the delivery collaborator.
    pub async fn enroll_sms(&self, principal_id: Uuid) -> Result<Dispatch> {
        let principal = self.load(principal_id).await?;

        if principal.mfa_status == MfaStatus::Active {
            return Err(AuthError::EnrollmentState(
                "a factor is already active; disable it first".to_string(),
            ));
        }

        let phone = principal
            .phone_number
            .as_deref()
            .filter(|_| principal.phone_verified)
            .ok_or_else(|| {
                AuthError::EnrollmentState("a verified phone number is required".to_string())
            })?;
        crate::validators::require_e164(phone)?;

        let dispatch = self.delivery.send_code(DeliveryChannel::Sms, phone).await?;

        self.credentials.begin_sms_enrollment(principal.id).await?;

        info!(principal_id = %principal.id, "SMS enrollment started");

        Ok(dispatch)
    }

    /// Activate the pending factor with its first successful verification.
    /// The only transition that makes a factor count at login.
    pub async fn activate(&self, principal_id: Uuid, code: &str) -> Result<()> {
        let principal = self.load(principal_id).await?;

        if principal.mfa_status != MfaStatus::Pending {
            return Err(AuthError::EnrollmentState(format!(
                "expected a pending enrollment, factor is {}",
                principal.mfa_status.as_str()
            )));
        }

        self.check_code(&principal, code).await?;
        self.credentials.activate_mfa(principal.id).await?;

        info!(
            principal_id = %principal.id,
            method = principal.mfa_method.as_str(),
            "multi-factor method activated"
        );

        Ok(())
    }

    /// Disable the active factor. Requires a fresh successful verification
    /// so a hijacked session cannot silently drop it, and bumps the version
    /// counter because multi-factor posture changed.
    pub async fn disable(&self, principal_id: Uuid, code: &str) -> Result<()> {
        let principal = self.load(principal_id).await?;

        if principal.mfa_status != MfaStatus::Active {
            return Err(AuthError::EnrollmentState(
                "no active factor to disable".to_string(),
            ));
        }

        self.check_code(&principal, code).await?;
        self.credentials.disable_mfa(principal.id).await?;
        let token_version = self.credentials.bump_token_version(principal.id).await?;

        warn!(
            principal_id = %principal.id,
            token_version,
            "multi-factor disabled, all sessions must re-authenticate"
        );

        Ok(())
    }

    /// Dispatch a login challenge for an SMS-enrolled principal.
    pub async fn send_challenge(&self, principal: &Principal) -> Result<Dispatch> {
        if !principal.mfa_active() || principal.mfa_method != MfaMethod::Sms {
            return Err(AuthError::EnrollmentState(
                "no active SMS factor".to_string(),
            ));
        }

        let phone = principal.phone_number.as_deref().ok_or_else(|| {
            AuthError::Internal("SMS factor active without a phone number".to_string())
        })?;

        self.delivery.send_code(DeliveryChannel::Sms, phone).await.map_err(Into::into)
    }

    /// Verify a login-time challenge. Honored only for an active factor;
    /// pending permits nothing but the activation call.
    pub async fn verify_challenge(&self, principal: &Principal, code: &str) -> Result<()> {
        if principal.mfa_status != MfaStatus::Active {
            return Err(AuthError::EnrollmentState(format!(
                "factor is {}, not active",
                principal.mfa_status.as_str()
            )));
        }

        self.check_code(principal, code).await
    }

    /// Rate-limited code check against the principal's enrolled method.
    async fn check_code(&self, principal: &Principal, code: &str) -> Result<()> {
        let subject = principal.id.to_string();
        self.guard
            .ensure_not_locked(LockoutChannel::OneTimeCode, &subject)
            .await?;

        let approved = match principal.mfa_method {
            MfaMethod::Totp => {
                let secret = principal.totp_secret.as_deref().ok_or_else(|| {
                    AuthError::Internal("TOTP enrollment without a secret".to_string())
                })?;
                TotpGenerator::verify_code(secret, code, self.totp_step_secs)?
            }
            MfaMethod::Sms => {
                let phone = principal.phone_number.as_deref().ok_or_else(|| {
                    AuthError::Internal("SMS enrollment without a phone number".to_string())
                })?;
                let check = self
                    .delivery
                    .check_code(DeliveryChannel::Sms, phone, code)
                    .await?;
                check == CodeCheck::Approved
            }
            MfaMethod::None => {
                return Err(AuthError::EnrollmentState(
                    "no factor enrolled".to_string(),
                ))
            }
        };

        if approved {
            self.guard
                .record_success(LockoutChannel::OneTimeCode, &subject)
                .await?;
            // Successful checks are logged for anomaly detection.
            info!(
                principal_id = %principal.id,
                method = principal.mfa_method.as_str(),
                "one-time code verified"
            );
            Ok(())
        } else {
            self.guard
                .record_failure(LockoutChannel::OneTimeCode, &subject)
                .await?;
            Err(AuthError::InvalidOneTimeCode)
        }
    }
}
