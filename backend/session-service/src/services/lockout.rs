/// Brute-force guard
///
/// Failure counters and time-boxed locks per principal/channel, kept in the
/// shared attempt store so every instance sees the same state. Login and
/// one-time-code channels use independent keys and independent thresholds;
/// code guessing is the higher-value target and gets the tighter policy.
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::PolicySettings;
use crate::error::{AuthError, Result};
use crate::store::AttemptStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutChannel {
    Login,
    OneTimeCode,
}

impl LockoutChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockoutChannel::Login => "login",
            LockoutChannel::OneTimeCode => "otp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    pub max_failures: u32,
    pub lockout: Duration,
}

pub struct BruteForceGuard {
    attempts: Arc<dyn AttemptStore>,
    login: LockoutPolicy,
    one_time_code: LockoutPolicy,
}

fn counter_key(channel: LockoutChannel, subject: &str) -> String {
    format!("lockout:{}:{}:n", channel.as_str(), subject)
}

fn lock_key(channel: LockoutChannel, subject: &str) -> String {
    format!("lockout:{}:{}:until", channel.as_str(), subject)
}

impl BruteForceGuard {
    pub fn new(attempts: Arc<dyn AttemptStore>, policy: &PolicySettings) -> Self {
        Self {
            attempts,
            login: LockoutPolicy {
                max_failures: policy.login_max_failures,
                lockout: Duration::from_secs(policy.login_lockout_secs),
            },
            one_time_code: LockoutPolicy {
                max_failures: policy.otp_max_failures,
                lockout: Duration::from_secs(policy.otp_lockout_secs),
            },
        }
    }

    pub fn with_policies(
        attempts: Arc<dyn AttemptStore>,
        login: LockoutPolicy,
        one_time_code: LockoutPolicy,
    ) -> Self {
        Self {
            attempts,
            login,
            one_time_code,
        }
    }

    fn policy(&self, channel: LockoutChannel) -> &LockoutPolicy {
        match channel {
            LockoutChannel::Login => &self.login,
            LockoutChannel::OneTimeCode => &self.one_time_code,
        }
    }

    /// Remaining lock duration for a key, if any. Checked before any costly
    /// verification work. The answer never depends on whether an account
    /// exists for the subject.
    pub async fn is_locked(
        &self,
        channel: LockoutChannel,
        subject: &str,
    ) -> Result<Option<Duration>> {
        self.attempts
            .lock_remaining(&lock_key(channel, subject))
            .await
    }

    /// `is_locked` as a precondition.
    pub async fn ensure_not_locked(&self, channel: LockoutChannel, subject: &str) -> Result<()> {
        if let Some(remaining) = self.is_locked(channel, subject).await? {
            return Err(AuthError::LockedOut {
                retry_after_secs: remaining.as_secs().max(1),
            });
        }
        Ok(())
    }

    /// Count a failure; impose the lock when the threshold is reached.
    /// Returns the imposed lock duration on the failure that crossed the
    /// threshold.
    pub async fn record_failure(
        &self,
        channel: LockoutChannel,
        subject: &str,
    ) -> Result<Option<Duration>> {
        let policy = self.policy(channel);
        let counter = counter_key(channel, subject);

        let count = self.attempts.increment(&counter, policy.lockout).await?;

        if count >= policy.max_failures as i64 {
            self.attempts
                .set_lock(&lock_key(channel, subject), policy.lockout)
                .await?;
            self.attempts.clear(&[counter.as_str()]).await?;
            warn!(
                channel = channel.as_str(),
                failures = count,
                lockout_secs = policy.lockout.as_secs(),
                "failure threshold reached, lockout imposed"
            );
            return Ok(Some(policy.lockout));
        }

        Ok(None)
    }

    /// A success clears the counter and any lock for the key.
    pub async fn record_success(&self, channel: LockoutChannel, subject: &str) -> Result<()> {
        let counter = counter_key(channel, subject);
        let lock = lock_key(channel, subject);
        self.attempts
            .clear(&[counter.as_str(), lock.as_str()])
            .await
    }
}
