//! Cryptographic operations for exam.
//!
//! The only secret this crate protects is the remote bearer token. It is
//! sealed into a text envelope with:
//! - **PBKDF2-HMAC-SHA256** (250,000 iterations) for key derivation
//! - **AES-256-GCM** for authenticated encryption
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the settings file holding the envelope
//! - Offline brute-force attacks on a short password
//! - Tampering with a stored or exported envelope
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - Access to an unlocked session (the session token is plaintext in memory)

pub mod envelope;
pub mod key;
pub mod password;
pub mod token;

pub use envelope::{decrypt, encrypt, Envelope};
pub use key::{derive_key, DerivedKey};
pub use password::validate_password;
pub use token::generate_token;
