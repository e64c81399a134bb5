//! Password checks applied before anything is encrypted.

use crate::error::{ExamError, Result};

/// Validate a password used to seal an envelope.
///
/// Only blank input is rejected. Envelopes protect a token the user can
/// regenerate, and the cost of guessing comes from the PBKDF2 work factor,
/// so no length floor is imposed.
///
/// # Examples
///
/// ```
/// use exam_core::crypto::validate_password;
///
/// assert!(validate_password("hunter2").is_ok());
/// assert!(validate_password("   ").is_err());
/// ```
pub fn validate_password(password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(ExamError::InvalidInput(
            "Password cannot be empty".to_string(),
        ));
    }
    Ok(())
}
