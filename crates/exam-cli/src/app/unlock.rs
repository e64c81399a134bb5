//! Unlocking the saved token, with retry.

use std::io::IsTerminal;

use exam_core::sync::MergeReport;
use exam_core::{ExamError, VaultState};
use tracing::debug;

use crate::constants::{env, MAX_UNLOCK_ATTEMPTS};
use crate::errors::CliError;

use super::context::App;
use super::prompt::prompt_password;

/// Make sure a session token is available, unlocking if needed.
///
/// Returns the pull that accompanies a fresh unlock. A pull failure after a
/// successful unlock is left to the notice stream; the session is usable.
pub async fn ensure_unlocked(app: &App, no_input: bool) -> anyhow::Result<Option<MergeReport>> {
    match app.vault().state()? {
        VaultState::Unlocked => return Ok(None),
        VaultState::Unset => return Err(CliError::from(ExamError::NotConfigured).into()),
        VaultState::Locked => {}
    }

    if let Some(password) = std::env::var(env::UNLOCK_PASSWORD)
        .ok()
        .filter(|v| !v.trim().is_empty())
    {
        return unlock_once(app, &password).await;
    }

    let interactive = std::io::stdin().is_terminal() && !no_input;
    if !interactive {
        return Err(CliError::auth_failed_with_hint(
            "Remote access is locked.",
            format!(
                "Run `exam remote unlock` in a terminal, or set {}.",
                env::UNLOCK_PASSWORD
            ),
        )
        .into());
    }

    for attempt in 1..=MAX_UNLOCK_ATTEMPTS {
        let password =
            tokio::task::spawn_blocking(|| prompt_password("Remote password")).await??;
        match unlock_once(app, &password).await {
            Ok(report) => return Ok(report),
            Err(e) if is_wrong_password(&e) && attempt < MAX_UNLOCK_ATTEMPTS => {
                eprintln!("Incorrect password. Try again.");
            }
            Err(e) => return Err(e),
        }
    }
    Err(CliError::auth_failed("Too many failed attempts.").into())
}

async fn unlock_once(app: &App, password: &str) -> anyhow::Result<Option<MergeReport>> {
    match app.sync.unlock(password).await {
        Ok(report) => Ok(Some(report)),
        Err(ExamError::Decryption) => Err(CliError::auth_failed("Incorrect password.").into()),
        Err(e) if app.vault().state()? == VaultState::Unlocked => {
            debug!(error = %e, "Unlocked, but the first pull failed");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn is_wrong_password(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<CliError>(),
        Some(CliError::AuthFailed { .. })
    )
}
