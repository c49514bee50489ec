//! In-memory store implementations and a wired service harness for
//! integration tests. No Postgres or Redis runs here; the trait seams carry
//! the same semantics the real stores provide.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use code_delivery::{CodeCheck, CodeDelivery, DeliveryChannel, DeliveryResult, Dispatch};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use session_service::config::{JwtSettings, PolicySettings};
use session_service::error::{AuthError, Result};
use session_service::models::{MfaMethod, MfaStatus, Principal, RevokedToken, Role, TokenKind};
use session_service::security::password::hash_password;
use session_service::security::token::TokenSigner;
use session_service::services::{
    BruteForceGuard, LockoutPolicy, RetryPolicy, RevocationRegistry, RotationService,
    SessionService, TokenService, TwoFactorService,
};
use session_service::store::{AttemptStore, CredentialStore, RevocationCache, RevocationStore};

// ---------------------------------------------------------------------------
// Credential store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryCredentialStore {
    principals: Mutex<HashMap<Uuid, Principal>>,
}

impl MemoryCredentialStore {
    pub fn insert(&self, principal: Principal) {
        self.principals
            .lock()
            .unwrap()
            .insert(principal.id, principal);
    }

    pub fn get(&self, id: Uuid) -> Option<Principal> {
        self.principals.lock().unwrap().get(&id).cloned()
    }

    fn update<T>(&self, id: Uuid, f: impl FnOnce(&mut Principal) -> T) -> Result<T> {
        let mut principals = self.principals.lock().unwrap();
        let principal = principals
            .get_mut(&id)
            .ok_or_else(|| AuthError::Database("principal not found".to_string()))?;
        Ok(f(principal))
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>> {
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>> {
        let principals = self.principals.lock().unwrap();
        Ok(principals
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn bump_token_version(&self, id: Uuid) -> Result<i32> {
        self.update(id, |p| {
            p.token_version += 1;
            p.token_version
        })
    }

    async fn record_login_success(&self, id: Uuid) -> Result<()> {
        self.update(id, |p| {
            p.failed_login_attempts = 0;
            p.locked_until = None;
            p.last_login_at = Some(Utc::now());
        })
    }

    async fn record_login_failure(
        &self,
        id: Uuid,
        max_attempts: i32,
        lock_duration_secs: i64,
    ) -> Result<()> {
        self.update(id, |p| {
            p.failed_login_attempts += 1;
            if max_attempts > 0 && p.failed_login_attempts >= max_attempts {
                p.locked_until = Some(Utc::now() + chrono::Duration::seconds(lock_duration_secs));
            }
        })
    }

    async fn begin_totp_enrollment(&self, id: Uuid, secret: &str) -> Result<()> {
        self.update(id, |p| {
            p.mfa_method = MfaMethod::Totp;
            p.mfa_status = MfaStatus::Pending;
            p.totp_secret = Some(secret.to_string());
        })
    }

    async fn begin_sms_enrollment(&self, id: Uuid) -> Result<()> {
        self.update(id, |p| {
            p.mfa_method = MfaMethod::Sms;
            p.mfa_status = MfaStatus::Pending;
            p.totp_secret = None;
        })
    }

    async fn activate_mfa(&self, id: Uuid) -> Result<()> {
        self.update(id, |p| {
            if p.mfa_status == MfaStatus::Pending {
                p.mfa_status = MfaStatus::Active;
            }
        })
    }

    async fn disable_mfa(&self, id: Uuid) -> Result<()> {
        self.update(id, |p| {
            p.mfa_method = MfaMethod::None;
            p.mfa_status = MfaStatus::Inactive;
            p.totp_secret = None;
        })
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<i32> {
        self.update(id, |p| {
            p.password_hash = password_hash.to_string();
            p.last_password_change_at = Some(Utc::now());
            p.token_version += 1;
            p.token_version
        })
    }
}

// ---------------------------------------------------------------------------
// Revocation cache (fast TTL store)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRevocationCache {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
    fail: AtomicBool,
}

impl MemoryRevocationCache {
    /// Simulate a transport outage: every call fails until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.fail.store(unavailable, Ordering::SeqCst);
    }

    /// Simulate a cache flush (entries lost, store healthy).
    pub fn wipe(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn contains_entry(&self, jti: &str) -> bool {
        let entries = self.entries.lock().unwrap();
        entries.get(jti).is_some_and(|exp| *exp > Utc::now())
    }

    fn check_available(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(AuthError::Cache("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn expiry(ttl: Duration) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
    }
}

#[async_trait]
impl RevocationCache for MemoryRevocationCache {
    async fn contains(&self, jti: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.contains_entry(jti))
    }

    async fn put(&self, jti: &str, ttl: Duration) -> Result<()> {
        self.check_available()?;
        self.entries
            .lock()
            .unwrap()
            .insert(jti.to_string(), Self::expiry(ttl));
        Ok(())
    }

    async fn put_if_absent(&self, jti: &str, ttl: Duration) -> Result<bool> {
        self.check_available()?;
        let mut entries = self.entries.lock().unwrap();
        let live = entries.get(jti).is_some_and(|exp| *exp > Utc::now());
        if live {
            Ok(false)
        } else {
            entries.insert(jti.to_string(), Self::expiry(ttl));
            Ok(true)
        }
    }
}

// ---------------------------------------------------------------------------
// Durable revocation store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRevocationStore {
    records: Mutex<HashMap<String, RevokedToken>>,
    fail: AtomicBool,
}

impl MemoryRevocationStore {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.fail.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn check_available(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(AuthError::Database("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn insert(&self, jti: &str, kind: TokenKind, expires_at: DateTime<Utc>) -> Result<()> {
        self.check_available()?;
        self.records.lock().unwrap().insert(
            jti.to_string(),
            RevokedToken {
                jti: jti.to_string(),
                kind,
                expires_at,
                revoked_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn find_unexpired(&self, jti: &str) -> Result<Option<RevokedToken>> {
        self.check_available()?;
        let records = self.records.lock().unwrap();
        Ok(records.get(jti).filter(|r| !r.is_expired()).cloned())
    }

    async fn purge_expired(&self) -> Result<u64> {
        self.check_available()?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|_, r| !r.is_expired());
        Ok((before - records.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Attempt store (lockout counters)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryAttemptStore {
    entries: Mutex<HashMap<String, (i64, DateTime<Utc>)>>,
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<i64> {
        let mut entries = self.entries.lock().unwrap();
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(window).unwrap();
        let count = match entries.get(key) {
            Some((count, exp)) if *exp > now => count + 1,
            _ => 1,
        };
        entries.insert(key.to_string(), (count, expires_at));
        Ok(count)
    }

    async fn lock_remaining(&self, key: &str) -> Result<Option<Duration>> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((_, exp)) if *exp > Utc::now() => {
                Ok(Some((*exp - Utc::now()).to_std().unwrap_or(Duration::ZERO)))
            }
            _ => Ok(None),
        }
    }

    async fn set_lock(&self, key: &str, duration: Duration) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            (1, Utc::now() + chrono::Duration::from_std(duration).unwrap()),
        );
        Ok(())
    }

    async fn clear(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Delivery stub
// ---------------------------------------------------------------------------

/// Approves one fixed code; every other code is denied. Deterministic stand-in
/// for the provider-side matching the real collaborator does.
pub struct StubDelivery {
    pub accepted_code: String,
    pub sent: Mutex<Vec<String>>,
}

impl StubDelivery {
    pub fn accepting(code: &str) -> Self {
        Self {
            accepted_code: code.to_string(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeDelivery for StubDelivery {
    async fn send_code(
        &self,
        _channel: DeliveryChannel,
        destination: &str,
    ) -> DeliveryResult<Dispatch> {
        self.sent.lock().unwrap().push(destination.to_string());
        Ok(Dispatch {
            dispatch_id: format!("stub-{}", self.sent.lock().unwrap().len()),
        })
    }

    async fn check_code(
        &self,
        _channel: DeliveryChannel,
        _destination: &str,
        code: &str,
    ) -> DeliveryResult<CodeCheck> {
        if code == self.accepted_code {
            Ok(CodeCheck::Approved)
        } else {
            Ok(CodeCheck::Denied)
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub const PASSWORD: &str = "Str0ng!Passw0rd#77";
pub const SMS_CODE: &str = "424242";

pub fn test_policy() -> PolicySettings {
    PolicySettings {
        access_token_ttl_secs: 900,
        refresh_token_ttl_secs: 604_800,
        remember_me_ttl_secs: 2_592_000,
        login_max_failures: 5,
        login_lockout_secs: 900,
        otp_max_failures: 3,
        otp_lockout_secs: 1800,
        totp_step_secs: 30,
        store_timeout_ms: 2000,
    }
}

pub struct Harness {
    pub credentials: Arc<MemoryCredentialStore>,
    pub cache: Arc<MemoryRevocationCache>,
    pub durable: Arc<MemoryRevocationStore>,
    pub attempts: Arc<MemoryAttemptStore>,
    pub delivery: Arc<StubDelivery>,
    pub registry: Arc<RevocationRegistry>,
    pub tokens: Arc<TokenService>,
    pub guard: Arc<BruteForceGuard>,
    pub two_factor: Arc<TwoFactorService>,
    pub rotation: RotationService,
    pub session: SessionService,
}

pub fn harness() -> Harness {
    harness_with(test_policy())
}

pub fn harness_with(policy: PolicySettings) -> Harness {
    let credentials = Arc::new(MemoryCredentialStore::default());
    let cache = Arc::new(MemoryRevocationCache::default());
    let durable = Arc::new(MemoryRevocationStore::default());
    let attempts = Arc::new(MemoryAttemptStore::default());
    let delivery = Arc::new(StubDelivery::accepting(SMS_CODE));

    let jwt = JwtSettings {
        secret: "integration-test-secret".to_string(),
        issuer: "atrium".to_string(),
    };
    let signer = TokenSigner::new(&jwt, &policy);

    let registry = Arc::new(
        RevocationRegistry::new(cache.clone(), durable.clone()).with_retry_policy(RetryPolicy {
            attempts: 2,
            initial_backoff: Duration::from_millis(10),
        }),
    );

    let tokens = Arc::new(TokenService::new(
        signer,
        credentials.clone(),
        registry.clone(),
    ));

    let guard = Arc::new(BruteForceGuard::new(attempts.clone(), &policy));

    let two_factor = Arc::new(TwoFactorService::new(
        credentials.clone(),
        guard.clone(),
        delivery.clone(),
        "Atrium".to_string(),
        policy.totp_step_secs,
    ));

    let rotation = RotationService::new(tokens.clone(), registry.clone(), credentials.clone());

    let session = SessionService::new(
        credentials.clone(),
        guard.clone(),
        tokens.clone(),
        two_factor.clone(),
        registry.clone(),
        LockoutPolicy {
            max_failures: policy.login_max_failures,
            lockout: Duration::from_secs(policy.login_lockout_secs),
        },
    );

    Harness {
        credentials,
        cache,
        durable,
        attempts,
        delivery,
        registry,
        tokens,
        guard,
        two_factor,
        rotation,
        session,
    }
}

pub fn seed_principal(harness: &Harness, email: &str) -> Principal {
    let principal = Principal {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: hash_password(PASSWORD).unwrap(),
        role: Role::Member,
        token_version: 1,
        mfa_method: MfaMethod::None,
        mfa_status: MfaStatus::Inactive,
        totp_secret: None,
        phone_number: None,
        phone_verified: false,
        failed_login_attempts: 0,
        locked_until: None,
        last_login_at: None,
        last_password_change_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    harness.credentials.insert(principal.clone());
    principal
}

pub fn seed_principal_with_phone(harness: &Harness, email: &str, phone: &str) -> Principal {
    let mut principal = seed_principal(harness, email);
    harness
        .credentials
        .update_phone(principal.id, phone, true);
    principal.phone_number = Some(phone.to_string());
    principal.phone_verified = true;
    principal
}

impl MemoryCredentialStore {
    pub fn update_phone(&self, id: Uuid, phone: &str, verified: bool) {
        let mut principals = self.principals.lock().unwrap();
        if let Some(p) = principals.get_mut(&id) {
            p.phone_number = Some(phone.to_string());
            p.phone_verified = verified;
        }
    }
}
