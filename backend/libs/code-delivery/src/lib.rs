//! One-time-code delivery client
//!
//! Services treat code delivery as a black box: they ask for a code to be
//! sent to a destination and later ask whether a submitted code matches.
//! Code generation, storage, and matching live with the provider.
//!
//! - `TwilioVerify`: production implementation over the Twilio Verify API
//! - `LoggedDelivery`: development fallback that logs codes instead of
//!   sending them and matches them locally

mod error;
pub mod models;

pub use error::{DeliveryError, DeliveryResult};

use rand::Rng;
use reqwest::Client;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::{VerificationCheckResponse, VerificationResponse};

/// Delivery channel for a one-time code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    Sms,
    Email,
}

impl DeliveryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryChannel::Sms => "sms",
            DeliveryChannel::Email => "email",
        }
    }
}

/// Receipt for a dispatched code.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub dispatch_id: String,
}

/// Outcome of a code check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Approved,
    Denied,
}

/// Contract every delivery provider implements.
#[async_trait::async_trait]
pub trait CodeDelivery: Send + Sync {
    /// Dispatch a fresh one-time code to `destination`.
    async fn send_code(
        &self,
        channel: DeliveryChannel,
        destination: &str,
    ) -> DeliveryResult<Dispatch>;

    /// Check a submitted code against the most recent dispatch for
    /// `destination`. A wrong or expired code is `Denied`, not an error.
    async fn check_code(
        &self,
        channel: DeliveryChannel,
        destination: &str,
        code: &str,
    ) -> DeliveryResult<CodeCheck>;
}

/// Mask a destination for logging. Keeps the last four characters.
pub fn mask_destination(destination: &str) -> String {
    if destination.len() <= 4 {
        return "****".to_string();
    }
    format!("****{}", &destination[destination.len() - 4..])
}

/// Twilio Verify credentials.
#[derive(Debug, Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
    pub service_sid: String,
}

/// Twilio Verify implementation.
///
/// Verify generates, stores, and expires codes server-side; this client only
/// starts verifications and submits checks.
#[derive(Clone)]
pub struct TwilioVerify {
    http: Client,
    options: TwilioOptions,
}

impl TwilioVerify {
    pub fn new(options: TwilioOptions) -> Self {
        Self {
            http: Client::new(),
            options,
        }
    }

    fn verifications_url(&self) -> String {
        format!(
            "https://verify.twilio.com/v2/Services/{}/Verifications",
            self.options.service_sid
        )
    }

    fn verification_check_url(&self) -> String {
        format!(
            "https://verify.twilio.com/v2/Services/{}/VerificationCheck",
            self.options.service_sid
        )
    }
}

#[async_trait::async_trait]
impl CodeDelivery for TwilioVerify {
    async fn send_code(
        &self,
        channel: DeliveryChannel,
        destination: &str,
    ) -> DeliveryResult<Dispatch> {
        let mut form: HashMap<&str, &str> = HashMap::new();
        form.insert("To", destination);
        form.insert("Channel", channel.as_str());

        let response = self
            .http
            .post(self.verifications_url())
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                destination = %mask_destination(destination),
                status = status.as_u16(),
                "Verification start rejected by provider"
            );
            return Err(DeliveryError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let body: VerificationResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::InvalidResponse(e.to_string()))?;

        info!(
            destination = %mask_destination(destination),
            dispatch_id = %body.sid,
            channel = channel.as_str(),
            "One-time code dispatched"
        );

        Ok(Dispatch {
            dispatch_id: body.sid,
        })
    }

    async fn check_code(
        &self,
        _channel: DeliveryChannel,
        destination: &str,
        code: &str,
    ) -> DeliveryResult<CodeCheck> {
        let mut form: HashMap<&str, &str> = HashMap::new();
        form.insert("To", destination);
        form.insert("Code", code);

        let response = self
            .http
            .post(self.verification_check_url())
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        // Verify answers 404 for a check with no pending verification; that is
        // a denial, not a provider outage.
        if status.as_u16() == 404 {
            return Ok(CodeCheck::Denied);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let body: VerificationCheckResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::InvalidResponse(e.to_string()))?;

        if body.status == "approved" {
            Ok(CodeCheck::Approved)
        } else {
            Ok(CodeCheck::Denied)
        }
    }
}

/// Development fallback: generates a six-digit code, logs it, and matches it
/// locally. Never use outside local development.
#[derive(Default)]
pub struct LoggedDelivery {
    pending: Mutex<HashMap<String, String>>,
}

impl LoggedDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_code() -> String {
        let mut rng = rand::thread_rng();
        (0..6).map(|_| rng.gen_range(0..10).to_string()).collect()
    }
}

#[async_trait::async_trait]
impl CodeDelivery for LoggedDelivery {
    async fn send_code(
        &self,
        channel: DeliveryChannel,
        destination: &str,
    ) -> DeliveryResult<Dispatch> {
        let code = Self::generate_code();
        warn!(
            destination = %mask_destination(destination),
            channel = channel.as_str(),
            code = %code,
            "Delivery provider not configured - one-time code logged for development"
        );
        let mut pending = self.pending.lock().await;
        pending.insert(destination.to_string(), code);
        Ok(Dispatch {
            dispatch_id: format!("logged-{:08x}", rand::thread_rng().gen::<u32>()),
        })
    }

    async fn check_code(
        &self,
        _channel: DeliveryChannel,
        destination: &str,
        code: &str,
    ) -> DeliveryResult<CodeCheck> {
        let mut pending = self.pending.lock().await;
        match pending.get(destination) {
            Some(expected) if expected == code => {
                pending.remove(destination);
                Ok(CodeCheck::Approved)
            }
            _ => Ok(CodeCheck::Denied),
        }
    }
}
