//! Credential vault for the remote bearer token.
//!
//! The token lives in two places at most: in plaintext in the volatile
//! session store while in use, and sealed in an envelope in the durable
//! settings store when the user asked to be remembered. Plaintext never
//! reaches the durable store.
//!
//! A fresh session with a saved envelope starts [`VaultState::Locked`] and
//! stays that way until [`CredentialVault::unlock`] succeeds.

use std::sync::Arc;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::{self, validate_password};
use crate::error::{ExamError, Result};
use crate::kv::{DurableKv, VolatileKv, REMOTE_ENCRYPTED_TOKEN, REMOTE_ENDPOINT, SESSION_TOKEN};
use crate::remote::normalize_endpoint;

/// Where the remote credential currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// Nothing configured; remote features are off.
    Unset,
    /// A sealed token is saved but this session has not unlocked it.
    Locked,
    /// The plaintext token is available for this session.
    Unlocked,
}

impl VaultState {
    pub fn as_str(self) -> &'static str {
        match self {
            VaultState::Unset => "unset",
            VaultState::Locked => "locked",
            VaultState::Unlocked => "unlocked",
        }
    }
}

impl std::fmt::Display for VaultState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupPayload {
    remote_endpoint: String,
    token: String,
}

impl Drop for BackupPayload {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.token.zeroize();
    }
}

/// Holds the injected stores; cheap to clone.
#[derive(Clone)]
pub struct CredentialVault {
    durable: Arc<dyn DurableKv>,
    volatile: Arc<dyn VolatileKv>,
}

impl CredentialVault {
    pub fn new(durable: Arc<dyn DurableKv>, volatile: Arc<dyn VolatileKv>) -> Self {
        Self { durable, volatile }
    }

    /// Derive the state from what the two stores hold right now.
    pub fn state(&self) -> Result<VaultState> {
        if self.volatile.get(SESSION_TOKEN)?.is_some() {
            return Ok(VaultState::Unlocked);
        }
        if self.durable.get(REMOTE_ENCRYPTED_TOKEN)?.is_some() {
            return Ok(VaultState::Locked);
        }
        Ok(VaultState::Unset)
    }

    /// Put `token` into the session, optionally remembering it sealed.
    ///
    /// With a password the envelope replaces any saved one. Without a
    /// password any saved envelope is removed, so the token lasts only for
    /// this session.
    pub async fn configure(&self, token: &str, password: Option<&str>) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ExamError::InvalidInput("Token cannot be empty".to_string()));
        }

        // Seal first so a failure leaves both stores untouched.
        let envelope = match password {
            Some(password) => {
                validate_password(password)?;
                Some(seal(token, password).await?)
            }
            None => None,
        };

        self.volatile.set(SESSION_TOKEN, token)?;
        match envelope {
            Some(envelope) => {
                self.durable.set(REMOTE_ENCRYPTED_TOKEN, &envelope)?;
                info!("Saved sealed remote token");
            }
            None => {
                self.durable.remove(REMOTE_ENCRYPTED_TOKEN)?;
                debug!("Remote token held for this session only");
            }
        }
        Ok(())
    }

    /// Open the saved envelope with `password` and start a session.
    ///
    /// When already unlocked the password is still checked against the
    /// saved envelope, but the session token is left as it is. A session
    /// with nothing saved has nothing to check and succeeds.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when nothing is saved; `Decryption` on a wrong
    /// password or damaged envelope, in which case the state is unchanged.
    pub async fn unlock(&self, password: &str) -> Result<()> {
        let envelope = self.durable.get(REMOTE_ENCRYPTED_TOKEN)?;
        let envelope = match (self.state()?, envelope) {
            (VaultState::Unset, _) => return Err(ExamError::NotConfigured),
            (VaultState::Unlocked, None) => return Ok(()),
            (VaultState::Unlocked, Some(envelope)) => {
                if open(&envelope, password).await.is_err() {
                    warn!("Password check failed");
                    return Err(ExamError::Decryption);
                }
                debug!("Already unlocked; password checked");
                return Ok(());
            }
            (VaultState::Locked, envelope) => envelope.ok_or(ExamError::NotConfigured)?,
        };
        let token = match open(&envelope, password).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Unlock failed");
                return Err(e);
            }
        };

        self.volatile.set(SESSION_TOKEN, &token)?;
        info!("Remote token unlocked");
        Ok(())
    }

    /// Drop the session token and the saved envelope.
    pub fn forget(&self) -> Result<()> {
        self.volatile.remove(SESSION_TOKEN)?;
        self.durable.remove(REMOTE_ENCRYPTED_TOKEN)?;
        info!("Forgot remote token");
        Ok(())
    }

    /// The token for this session.
    ///
    /// # Errors
    ///
    /// `Locked` when a saved token has not been unlocked yet, and
    /// `NotConfigured` when there is none at all. A saved envelope is
    /// never used without the password.
    pub fn session_token(&self) -> Result<SecretString> {
        if let Some(token) = self.volatile.get(SESSION_TOKEN)? {
            return Ok(SecretString::from(token));
        }
        match self.state()? {
            VaultState::Locked => Err(ExamError::Locked),
            _ => Err(ExamError::NotConfigured),
        }
    }

    /// Use `token` for this session only, leaving any saved envelope alone.
    pub fn adopt_token(&self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ExamError::InvalidInput("Token cannot be empty".to_string()));
        }
        self.volatile.set(SESSION_TOKEN, token)
    }

    pub fn endpoint(&self) -> Result<Option<String>> {
        self.durable.get(REMOTE_ENDPOINT)
    }

    /// Normalise and save the remote endpoint. Returns the saved form.
    pub fn set_endpoint(&self, raw: &str) -> Result<String> {
        let endpoint = normalize_endpoint(raw)?;
        self.durable.set(REMOTE_ENDPOINT, &endpoint)?;
        Ok(endpoint)
    }

    /// Seal `{remoteEndpoint, token}` under a separate export password.
    pub async fn export_backup(&self, export_password: &str) -> Result<String> {
        validate_password(export_password)?;
        let endpoint = self.endpoint()?.ok_or_else(|| {
            ExamError::InvalidInput("No remote endpoint is configured".to_string())
        })?;
        let token = self.session_token()?;

        let payload = BackupPayload {
            remote_endpoint: endpoint,
            token: secrecy::ExposeSecret::expose_secret(&token).to_string(),
        };
        let json = Zeroizing::new(serde_json::to_string(&payload)?);
        seal(&json, export_password).await
    }

    /// Restore a backup produced by [`export_backup`](Self::export_backup).
    ///
    /// The export password only opens the backup. The token is then
    /// configured as usual, sealed at rest under `at_rest_password` if one
    /// is given.
    pub async fn import_backup(
        &self,
        envelope: &str,
        export_password: &str,
        at_rest_password: Option<&str>,
    ) -> Result<()> {
        let json = open(envelope, export_password).await?;
        let payload: BackupPayload = serde_json::from_str(&json).map_err(|_| {
            ExamError::InvalidInput("Backup does not contain remote settings".to_string())
        })?;

        self.set_endpoint(&payload.remote_endpoint)?;
        self.configure(&payload.token, at_rest_password).await?;
        info!("Imported remote settings backup");
        Ok(())
    }
}

/// Encrypt on the blocking pool; PBKDF2 would stall the runtime otherwise.
async fn seal(plaintext: &str, password: &str) -> Result<String> {
    let plaintext = Zeroizing::new(plaintext.to_string());
    let password = Zeroizing::new(password.to_string());
    tokio::task::spawn_blocking(move || crypto::encrypt(&plaintext, &password))
        .await
        .map_err(|e| ExamError::Other(format!("Encryption task failed: {}", e)))?
}

async fn open(envelope: &str, password: &str) -> Result<Zeroizing<String>> {
    let envelope = envelope.to_string();
    let password = Zeroizing::new(password.to_string());
    tokio::task::spawn_blocking(move || crypto::decrypt(&envelope, &password).map(Zeroizing::new))
        .await
        .map_err(|e| ExamError::Other(format!("Decryption task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use secrecy::ExposeSecret;

    fn setup() -> (CredentialVault, Arc<MemoryKv>, Arc<MemoryKv>) {
        let durable = Arc::new(MemoryKv::new());
        let volatile = Arc::new(MemoryKv::new());
        (
            CredentialVault::new(durable.clone(), volatile.clone()),
            durable,
            volatile,
        )
    }

    #[tokio::test]
    async fn test_starts_unset() {
        let (vault, _, _) = setup();
        assert_eq!(vault.state().unwrap(), VaultState::Unset);
        assert!(matches!(vault.session_token(), Err(ExamError::NotConfigured)));
        assert!(matches!(vault.unlock("pw").await, Err(ExamError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_configure_with_password_seals_at_rest() {
        let (vault, durable, _) = setup();
        vault.configure("abc123", Some("hunter2")).await.unwrap();

        assert_eq!(vault.state().unwrap(), VaultState::Unlocked);
        assert_eq!(vault.session_token().unwrap().expose_secret(), "abc123");

        let envelope = DurableKv::get(durable.as_ref(), REMOTE_ENCRYPTED_TOKEN)
            .unwrap()
            .unwrap();
        assert!(!envelope.contains("abc123"));
        assert_eq!(crypto::decrypt(&envelope, "hunter2").unwrap(), "abc123");
    }

    #[tokio::test]
    async fn test_configure_without_password_clears_saved_envelope() {
        let (vault, durable, _) = setup();
        vault.configure("first", Some("pw")).await.unwrap();
        vault.configure("second", None).await.unwrap();

        assert_eq!(
            DurableKv::get(durable.as_ref(), REMOTE_ENCRYPTED_TOKEN).unwrap(),
            None
        );
        assert_eq!(vault.session_token().unwrap().expose_secret(), "second");
    }

    #[tokio::test]
    async fn test_configure_rejects_blank_input_without_side_effects() {
        let (vault, _, _) = setup();
        assert!(vault.configure("  ", None).await.is_err());
        assert!(vault.configure("tok", Some(" ")).await.is_err());
        assert_eq!(vault.state().unwrap(), VaultState::Unset);
    }

    #[tokio::test]
    async fn test_new_session_is_locked_until_unlocked() {
        let (vault, durable, _) = setup();
        vault.configure("abc123", Some("hunter2")).await.unwrap();

        // A fresh session shares the durable store but not the volatile one.
        let session = CredentialVault::new(durable, Arc::new(MemoryKv::new()));
        assert_eq!(session.state().unwrap(), VaultState::Locked);
        assert!(matches!(session.session_token(), Err(ExamError::Locked)));

        assert!(matches!(session.unlock("wrong").await, Err(ExamError::Decryption)));
        assert_eq!(session.state().unwrap(), VaultState::Locked);

        session.unlock("hunter2").await.unwrap();
        assert_eq!(session.state().unwrap(), VaultState::Unlocked);
        assert_eq!(session.session_token().unwrap().expose_secret(), "abc123");
    }

    #[tokio::test]
    async fn test_unlock_when_unlocked_still_checks_password() {
        let (vault, _, _) = setup();
        vault.configure("abc123", Some("hunter2")).await.unwrap();
        assert_eq!(vault.state().unwrap(), VaultState::Unlocked);

        assert!(matches!(vault.unlock("wrong").await, Err(ExamError::Decryption)));
        assert_eq!(vault.state().unwrap(), VaultState::Unlocked);
        vault.unlock("hunter2").await.unwrap();
        assert_eq!(vault.session_token().unwrap().expose_secret(), "abc123");

        // Session-only tokens have no envelope to check against.
        vault.configure("session-only", None).await.unwrap();
        vault.unlock("anything").await.unwrap();
    }

    #[tokio::test]
    async fn test_forget_clears_everything() {
        let (vault, _, _) = setup();
        vault.configure("abc123", Some("hunter2")).await.unwrap();
        vault.forget().unwrap();
        assert_eq!(vault.state().unwrap(), VaultState::Unset);
    }

    #[tokio::test]
    async fn test_adopt_token_is_session_only() {
        let (vault, durable, _) = setup();
        vault.adopt_token("generated").unwrap();
        assert_eq!(vault.state().unwrap(), VaultState::Unlocked);
        assert_eq!(
            DurableKv::get(durable.as_ref(), REMOTE_ENCRYPTED_TOKEN).unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_backup_round_trip_uses_separate_passwords() {
        let (vault, _, _) = setup();
        vault.set_endpoint("http://kv.example.dev/").unwrap();
        vault.configure("abc123", None).await.unwrap();
        let backup = vault.export_backup("export-pw").await.unwrap();

        let (other, other_durable, _) = setup();
        assert!(matches!(
            other.import_backup(&backup, "wrong", None).await,
            Err(ExamError::Decryption)
        ));

        other
            .import_backup(&backup, "export-pw", Some("rest-pw"))
            .await
            .unwrap();
        assert_eq!(other.endpoint().unwrap().as_deref(), Some("https://kv.example.dev"));
        assert_eq!(other.session_token().unwrap().expose_secret(), "abc123");

        let envelope = DurableKv::get(other_durable.as_ref(), REMOTE_ENCRYPTED_TOKEN)
            .unwrap()
            .unwrap();
        assert_eq!(crypto::decrypt(&envelope, "rest-pw").unwrap(), "abc123");
    }

    #[tokio::test]
    async fn test_export_requires_unlocked_token() {
        let (vault, _, _) = setup();
        vault.set_endpoint("kv.example.dev").unwrap();
        assert!(matches!(
            vault.export_backup("pw").await,
            Err(ExamError::NotConfigured)
        ));
    }
}
