/// Input validation helpers
use crate::error::{AuthError, Result};

/// Validate E.164 phone number format (e.g., +14155551234)
pub fn is_valid_e164(phone: &str) -> bool {
    if !phone.starts_with('+') {
        return false;
    }
    let digits = &phone[1..];
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// E.164 check as a precondition.
pub fn require_e164(phone: &str) -> Result<()> {
    if is_valid_e164(phone) {
        Ok(())
    } else {
        Err(AuthError::Validation(
            "Phone number must be in E.164 format (e.g., +14155551234)".to_string(),
        ))
    }
}
