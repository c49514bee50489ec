//! Configuration management for Session Service
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::info;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub jwt: JwtSettings,
    pub policy: PolicySettings,
    pub delivery: DeliverySettings,
    pub maintenance: MaintenanceSettings,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self> {
        // Load .env file in development
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            database: DatabaseSettings::from_env()?,
            redis: RedisSettings::from_env()?,
            jwt: JwtSettings::from_env()?,
            policy: PolicySettings::from_env()?,
            delivery: DeliverySettings::from_env(),
            maintenance: MaintenanceSettings::from_env()?,
        })
    }
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .context("Invalid DATABASE_MIN_CONNECTIONS")?,
            acquire_timeout: env::var("DATABASE_ACQUIRE_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_ACQUIRE_TIMEOUT")?,
        })
    }
}

/// Redis cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub url: String,
}

impl RedisSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("REDIS_URL").context("REDIS_URL must be set")?,
        })
    }
}

/// JWT signing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "atrium".to_string()),
        })
    }
}

/// Security policy knobs
///
/// Lifetimes and lockout thresholds for the whole subsystem. Login and
/// one-time-code lockouts are independent channels with independent
/// thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySettings {
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub remember_me_ttl_secs: u64,
    pub login_max_failures: u32,
    pub login_lockout_secs: u64,
    pub otp_max_failures: u32,
    pub otp_lockout_secs: u64,
    pub totp_step_secs: u64,
    /// Upper bound on any single cache or durable-store call.
    pub store_timeout_ms: u64,
}

impl PolicySettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            access_token_ttl_secs: env::var("ACCESS_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .context("Invalid ACCESS_TOKEN_TTL_SECS")?,
            refresh_token_ttl_secs: env::var("REFRESH_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "604800".to_string())
                .parse()
                .context("Invalid REFRESH_TOKEN_TTL_SECS")?,
            remember_me_ttl_secs: env::var("REMEMBER_ME_TTL_SECS")
                .unwrap_or_else(|_| "2592000".to_string())
                .parse()
                .context("Invalid REMEMBER_ME_TTL_SECS")?,
            login_max_failures: env::var("LOGIN_MAX_FAILURES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid LOGIN_MAX_FAILURES")?,
            login_lockout_secs: env::var("LOGIN_LOCKOUT_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .context("Invalid LOGIN_LOCKOUT_SECS")?,
            otp_max_failures: env::var("OTP_MAX_FAILURES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("Invalid OTP_MAX_FAILURES")?,
            otp_lockout_secs: env::var("OTP_LOCKOUT_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .context("Invalid OTP_LOCKOUT_SECS")?,
            totp_step_secs: env::var("TOTP_STEP_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid TOTP_STEP_SECS")?,
            store_timeout_ms: env::var("STORE_TIMEOUT_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .context("Invalid STORE_TIMEOUT_MS")?,
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// One-time-code delivery provider configuration (Twilio Verify)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySettings {
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_verify_service_sid: Option<String>,
}

impl DeliverySettings {
    fn from_env() -> Self {
        Self {
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").ok(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").ok(),
            twilio_verify_service_sid: env::var("TWILIO_VERIFY_SERVICE_SID").ok(),
        }
    }

    /// Check if the Twilio Verify provider is configured
    pub fn is_configured(&self) -> bool {
        self.twilio_account_sid.is_some()
            && self.twilio_auth_token.is_some()
            && self.twilio_verify_service_sid.is_some()
    }

    /// Build the delivery provider: Twilio Verify when configured, the
    /// logging fallback otherwise.
    pub fn build(&self) -> std::sync::Arc<dyn code_delivery::CodeDelivery> {
        match (
            &self.twilio_account_sid,
            &self.twilio_auth_token,
            &self.twilio_verify_service_sid,
        ) {
            (Some(account_sid), Some(auth_token), Some(service_sid)) => {
                std::sync::Arc::new(code_delivery::TwilioVerify::new(code_delivery::TwilioOptions {
                    account_sid: account_sid.clone(),
                    auth_token: auth_token.clone(),
                    service_sid: service_sid.clone(),
                }))
            }
            _ => std::sync::Arc::new(code_delivery::LoggedDelivery::new()),
        }
    }
}

/// Background maintenance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceSettings {
    /// Interval between sweeps of expired durable revocation records.
    pub revocation_sweep_interval_secs: u64,
}

impl MaintenanceSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            revocation_sweep_interval_secs: env::var("REVOCATION_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .context("Invalid REVOCATION_SWEEP_INTERVAL_SECS")?,
        })
    }
}
