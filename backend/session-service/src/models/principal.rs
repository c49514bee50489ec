use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Principal role matching database principal_role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "principal_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

/// Multi-factor method matching database mfa_method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "mfa_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MfaMethod {
    None,
    Totp,
    Sms,
}

impl MfaMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MfaMethod::None => "none",
            MfaMethod::Totp => "totp",
            MfaMethod::Sms => "sms",
        }
    }
}

/// Multi-factor enrollment status matching database mfa_status
///
/// `Pending` only permits the activation verification; `Active` is the only
/// state honored at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "mfa_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MfaStatus {
    Inactive,
    Pending,
    Active,
}

impl MfaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MfaStatus::Inactive => "inactive",
            MfaStatus::Pending => "pending",
            MfaStatus::Active => "active",
        }
    }
}

/// Principal credential record - the durable identity entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    /// Monotonic counter; bumping it invalidates every token issued under
    /// the prior value.
    pub token_version: i32,
    pub mfa_method: MfaMethod,
    pub mfa_status: MfaStatus,
    pub totp_secret: Option<String>,
    pub phone_number: Option<String>,
    pub phone_verified: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_password_change_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    /// Check the durable lockout mirror.
    pub fn is_locked(&self) -> bool {
        if let Some(locked_until) = self.locked_until {
            locked_until > Utc::now()
        } else {
            false
        }
    }

    /// True when a multi-factor method must be honored at login.
    pub fn mfa_active(&self) -> bool {
        self.mfa_method != MfaMethod::None && self.mfa_status == MfaStatus::Active
    }
}
