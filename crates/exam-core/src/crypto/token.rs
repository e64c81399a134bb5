//! Bearer token generation.

use crate::error::{ExamError, Result};

/// Length of generated tokens in characters.
pub const TOKEN_LENGTH: usize = 32;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random alphanumeric bearer token from the OS CSPRNG.
///
/// Bytes at or above the largest multiple of the alphabet size are
/// discarded so every character is equally likely.
pub fn generate_token() -> Result<String> {
    let limit = (256 / ALPHABET.len() * ALPHABET.len()) as u8;
    let mut token = String::with_capacity(TOKEN_LENGTH);
    let mut buf = [0u8; 64];

    while token.len() < TOKEN_LENGTH {
        getrandom::getrandom(&mut buf)
            .map_err(|e| ExamError::Other(format!("Failed to gather randomness: {}", e)))?;
        for byte in buf {
            if byte >= limit {
                continue;
            }
            token.push(ALPHABET[byte as usize % ALPHABET.len()] as char);
            if token.len() == TOKEN_LENGTH {
                break;
            }
        }
    }

    Ok(token)
}
