/// Time-based one-time codes (TOTP)
use base64::{engine::general_purpose::STANDARD as base64_engine, Engine as _};
use rand::Rng;
use totp_lite::{totp_custom, Sha1};

use crate::error::{AuthError, Result};

const SECRET_LEN: usize = 20;
const CODE_DIGITS: u32 = 6;

pub struct TotpGenerator;

impl TotpGenerator {
    /// Generate a new TOTP secret and provisioning URI for QR display.
    pub fn generate_secret_and_uri(account: &str, issuer: &str) -> (String, String) {
        let mut rng = rand::thread_rng();
        let mut secret_bytes = [0u8; SECRET_LEN];
        rng.fill(&mut secret_bytes);

        let secret = base64_engine.encode(secret_bytes);

        let uri = format!(
            "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}",
            issuer = urlencoding::encode(issuer),
            account = urlencoding::encode(account),
            secret = secret,
        );

        (secret, uri)
    }

    /// Verify a code against the current time.
    pub fn verify_code(secret: &str, code: &str, step_secs: u64) -> Result<bool> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|_| AuthError::Internal("System clock before Unix epoch".to_string()))?
            .as_secs();

        Self::verify_at(secret, code, step_secs, now)
    }

    /// Verify a code at an explicit timestamp.
    ///
    /// Accepts the current time step and one adjacent step in each direction
    /// to tolerate clock skew. Codes are not consumed; a valid code stays
    /// valid for its window.
    pub fn verify_at(secret: &str, code: &str, step_secs: u64, unix_time: u64) -> Result<bool> {
        if code.len() != CODE_DIGITS as usize || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let secret_bytes = base64_engine
            .decode(secret)
            .map_err(|_| AuthError::Internal("Malformed TOTP secret".to_string()))?;

        if secret_bytes.len() != SECRET_LEN {
            return Err(AuthError::Internal("Malformed TOTP secret".to_string()));
        }

        // Current step plus one step of skew in each direction.
        let candidates = [
            unix_time.saturating_sub(step_secs),
            unix_time,
            unix_time + step_secs,
        ];

        Ok(candidates
            .iter()
            .any(|t| totp_custom::<Sha1>(step_secs, CODE_DIGITS, &secret_bytes, *t) == code))
    }

    /// Expected code at a timestamp. Test and enrollment-preview helper.
    pub fn code_at(secret: &str, step_secs: u64, unix_time: u64) -> Result<String> {
        let secret_bytes = base64_engine
            .decode(secret)
            .map_err(|_| AuthError::Internal("Malformed TOTP secret".to_string()))?;
        Ok(totp_custom::<Sha1>(
            step_secs,
            CODE_DIGITS,
            &secret_bytes,
            unix_time,
        ))
    }
}
