//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! Envelopes carry no parameters besides the salt, so the iteration count
//! and key length are fixed constants. Changing them makes every existing
//! envelope undecryptable.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

use crate::error::{ExamError, Result};

/// PBKDF2 iteration count.
///
/// High enough that brute forcing a short human password offline costs
/// real hardware time; the derivation takes a noticeable fraction of a
/// second on a laptop.
pub const PBKDF2_ITERATIONS: u32 = 250_000;

/// Minimum salt length in bytes.
pub const MIN_SALT_LENGTH: usize = 16;

/// Length of derived key in bytes (32 bytes = 256 bits for AES-256-GCM).
pub const KEY_LENGTH: usize = 32;

/// A symmetric key derived from a password.
///
/// Key material is zeroized from memory when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Get a reference to the raw key bytes.
    ///
    /// # Security
    ///
    /// Avoid storing or logging this value. Use only for immediate encryption operations.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive an encryption key from a password using PBKDF2-HMAC-SHA256.
///
/// # Security
///
/// - Same password + salt always produces the same key (deterministic)
/// - Different salt produces a different key (the salt travels in the envelope)
///
/// # Examples
///
/// ```
/// use exam_core::crypto::derive_key;
///
/// let salt = b"unique-salt-per-envelope";
/// let key = derive_key("my-password", salt).unwrap();
/// assert_eq!(key.as_bytes().len(), 32);
/// ```
pub fn derive_key(password: &str, salt: &[u8]) -> Result<DerivedKey> {
    if password.is_empty() {
        return Err(ExamError::InvalidInput(
            "Password cannot be empty".to_string(),
        ));
    }

    if salt.len() < MIN_SALT_LENGTH {
        return Err(ExamError::InvalidInput(format!(
            "Salt must be at least {} bytes",
            MIN_SALT_LENGTH
        )));
    }

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key_bytes);

    Ok(DerivedKey::from_bytes(key_bytes))
}
