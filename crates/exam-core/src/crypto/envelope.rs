//! Password-based envelope encryption for short secrets.
//!
//! An envelope is three standard-alphabet base64 segments joined by `.`:
//! the PBKDF2 salt, the AES-GCM nonce, and the ciphertext with its
//! authentication tag appended. There is no version field; the format is
//! fixed by the constants in this module and in [`super::key`].

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::key::{derive_key, MIN_SALT_LENGTH};
use crate::error::{ExamError, Result};

/// Salt length written into new envelopes.
pub const SALT_LENGTH: usize = MIN_SALT_LENGTH;

/// AES-GCM nonce length.
pub const IV_LENGTH: usize = 12;

/// Separator between the three envelope segments.
pub const SEPARATOR: char = '.';

/// Parsed form of an envelope string.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    pub salt: Vec<u8>,
    pub iv: [u8; IV_LENGTH],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Parse an envelope string.
    ///
    /// Every structural problem maps to [`ExamError::Decryption`] so callers
    /// cannot tell a mangled envelope from a wrong password.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.trim().split(SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(ExamError::Decryption);
        }

        let salt = decode_segment(parts[0])?;
        let iv_bytes = decode_segment(parts[1])?;
        let ciphertext = decode_segment(parts[2])?;

        if salt.len() < MIN_SALT_LENGTH {
            return Err(ExamError::Decryption);
        }
        let iv: [u8; IV_LENGTH] = iv_bytes
            .as_slice()
            .try_into()
            .map_err(|_| ExamError::Decryption)?;

        Ok(Self {
            salt,
            iv,
            ciphertext,
        })
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            STANDARD.encode(&self.salt),
            SEPARATOR,
            STANDARD.encode(self.iv),
            SEPARATOR,
            STANDARD.encode(&self.ciphertext)
        )
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("salt_len", &self.salt.len())
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(segment.as_bytes())
        .map_err(|_| ExamError::Decryption)
}

fn random_bytes(buf: &mut [u8]) -> Result<()> {
    getrandom::getrandom(buf)
        .map_err(|e| ExamError::Other(format!("Failed to gather randomness: {}", e)))
}

/// Encrypt `plaintext` under a key derived from `password`.
///
/// A fresh salt and nonce are drawn for every call, so encrypting the same
/// input twice yields two different envelopes.
///
/// # Examples
///
/// ```
/// use exam_core::crypto::{decrypt, encrypt};
///
/// let envelope = encrypt("abc123", "hunter2").unwrap();
/// assert_eq!(envelope.split('.').count(), 3);
/// assert_eq!(decrypt(&envelope, "hunter2").unwrap(), "abc123");
/// ```
pub fn encrypt(plaintext: &str, password: &str) -> Result<String> {
    let mut salt = vec![0u8; SALT_LENGTH];
    random_bytes(&mut salt)?;
    let mut iv = [0u8; IV_LENGTH];
    random_bytes(&mut iv)?;

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| ExamError::Other(format!("Failed to create cipher: {}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| ExamError::Other("Encryption failed".to_string()))?;

    Ok(Envelope {
        salt,
        iv,
        ciphertext,
    }
    .to_string())
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// # Errors
///
/// Returns [`ExamError::Decryption`] for a wrong password, a tampered or
/// truncated envelope, or anything that does not parse as an envelope.
/// Partially decrypted output is never returned.
pub fn decrypt(envelope: &str, password: &str) -> Result<String> {
    let envelope = Envelope::parse(envelope)?;

    let key = derive_key(password, &envelope.salt).map_err(|_| ExamError::Decryption)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| ExamError::Decryption)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&envelope.iv), envelope.ciphertext.as_slice())
        .map_err(|_| ExamError::Decryption)?;

    String::from_utf8(plaintext).map_err(|_| ExamError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let plaintext = "Hello, World! This is a secret token.";
        let envelope = encrypt(plaintext, "test-password-123").unwrap();
        let decrypted = decrypt(&envelope, "test-password-123").unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_round_trip_unicode_and_empty() {
        for plaintext in ["", "토큰 🔑 with spaces"] {
            let envelope = encrypt(plaintext, "pw").unwrap();
            assert_eq!(decrypt(&envelope, "pw").unwrap(), plaintext);
        }
    }

    #[test]
    fn test_wrong_password_fails_decryption() {
        let envelope = encrypt("secret data", "correct-password").unwrap();
        let result = decrypt(&envelope, "wrong-password");
        assert!(matches!(result, Err(ExamError::Decryption)));
    }

    #[test]
    fn test_same_input_produces_different_envelopes() {
        let first = encrypt("same plaintext", "same-password").unwrap();
        let second = encrypt("same plaintext", "same-password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = encrypt("abc", "pw").unwrap();
        let parsed = Envelope::parse(&envelope).unwrap();
        assert_eq!(parsed.salt.len(), SALT_LENGTH);
        // 3 bytes of plaintext plus the 16-byte GCM tag
        assert_eq!(parsed.ciphertext.len(), 3 + 16);
        assert_eq!(parsed.to_string(), envelope);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let envelope = encrypt("secret data", "password").unwrap();
        let parsed = Envelope::parse(&envelope).unwrap();

        for index in [0, parsed.ciphertext.len() / 2, parsed.ciphertext.len() - 1] {
            let mut tampered = parsed.clone();
            tampered.ciphertext[index] ^= 0x01;
            let result = decrypt(&tampered.to_string(), "password");
            assert!(matches!(result, Err(ExamError::Decryption)));
        }
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let envelope = encrypt("secret data", "password").unwrap();
        let mut parsed = Envelope::parse(&envelope).unwrap();
        parsed.ciphertext.truncate(parsed.ciphertext.len() - 1);
        let result = decrypt(&parsed.to_string(), "password");
        assert!(matches!(result, Err(ExamError::Decryption)));
    }

    #[test]
    fn test_wrong_segment_count_fails() {
        let envelope = encrypt("secret", "password").unwrap();
        let two_segments: String = envelope.rsplitn(2, SEPARATOR).nth(1).unwrap().to_string();
        let four_segments = format!("{}.AAAA", envelope);

        assert!(matches!(
            decrypt(&two_segments, "password"),
            Err(ExamError::Decryption)
        ));
        assert!(matches!(
            decrypt(&four_segments, "password"),
            Err(ExamError::Decryption)
        ));
    }

    #[test]
    fn test_garbage_is_uniform_error() {
        for garbage in ["", "not an envelope", "!!.??.**", "AAAA.AAAA.AAAA"] {
            assert!(matches!(
                decrypt(garbage, "password"),
                Err(ExamError::Decryption)
            ));
        }
    }

    #[test]
    fn test_empty_password_on_decrypt_is_uniform_error() {
        let envelope = encrypt("secret", "password").unwrap();
        assert!(matches!(decrypt(&envelope, ""), Err(ExamError::Decryption)));
    }

    #[test]
    fn test_debug_does_not_leak_bytes() {
        let envelope = Envelope::parse(&encrypt("secret", "pw").unwrap()).unwrap();
        let debug = format!("{:?}", envelope);
        assert!(debug.contains("salt_len"));
        assert!(!debug.contains(&STANDARD.encode(&envelope.ciphertext)));
    }
}
