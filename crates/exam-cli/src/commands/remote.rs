use std::io::IsTerminal;

use serde_json::json;
use tracing::debug;
use zeroize::Zeroizing;

use exam_core::crypto::generate_token;
use exam_core::VaultState;

use crate::app::{
    ensure_unlocked, prompt_new_password, prompt_password, read_input, App, AppContext,
};
use crate::cli::RemoteCommand;
use crate::constants::env;
use crate::errors::CliError;
use crate::ui::{badge, header, hint, kv, print, Badge, Spinner, UiContext};

use super::sync::print_merge_report;

pub async fn handle_remote(ctx: &AppContext<'_>, command: &RemoteCommand) -> anyhow::Result<()> {
    let app = ctx.open()?;
    let result = match command {
        RemoteCommand::Configure {
            endpoint,
            token,
            session_only,
            no_input,
        } => configure(ctx, &app, endpoint, token.as_deref(), *session_only, *no_input).await,
        RemoteCommand::Unlock { no_input } => {
            let ui = ctx.ui();
            if app.vault().state()? == VaultState::Unlocked {
                print(ui, &badge(ui, Badge::Info, "Already unlocked"));
                Ok(())
            } else {
                let report = ensure_unlocked(&app, *no_input).await?;
                print(ui, &badge(ui, Badge::Ok, "Unlocked"));
                if let Some(report) = report {
                    print_merge_report(ui, &report);
                }
                Ok(())
            }
        }
        RemoteCommand::Forget => {
            app.vault().forget()?;
            if !ctx.quiet() {
                let ui = ctx.ui();
                print(ui, &badge(ui, Badge::Ok, "Remote token forgotten"));
                print(ui, &hint(ui, "Local papers are kept; the endpoint stays saved."));
            }
            Ok(())
        }
        RemoteCommand::Status { json } => status(ctx, &app, *json),
        RemoteCommand::GenerateToken { adopt } => {
            let token = Zeroizing::new(generate_token()?);
            if *adopt {
                app.vault().adopt_token(&token)?;
            }
            println!("{}", token.as_str());
            if *adopt && !ctx.quiet() {
                let ui = ctx.ui();
                eprintln!("{}", badge(ui, Badge::Info, "Token adopted for this session"));
            }
            Ok(())
        }
        RemoteCommand::Test => {
            ensure_unlocked(&app, false).await?;
            let ui = ctx.ui();
            let spinner = Spinner::new(ui, "Contacting remote");
            if app.sync.test_connection().await? {
                spinner.finish("Token accepted");
            } else {
                spinner.finish("Token accepted; no folders yet");
                print(ui, &hint(ui, "exam sync push"));
            }
            Ok(())
        }
        RemoteCommand::BackupExport { output } => {
            ensure_unlocked(&app, false).await?;
            let password = backup_password(true).await?;
            let envelope = app.vault().export_backup(&password).await?;
            match output.as_deref() {
                Some(path) if path != "-" => {
                    exam_core::fs::write_private_atomic(
                        std::path::Path::new(path),
                        envelope.as_bytes(),
                    )
                    .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path, e))?;
                    if !ctx.quiet() {
                        let ui = ctx.ui();
                        print(ui, &badge(ui, Badge::Ok, "Backup written"));
                        print(ui, &kv(ui, "File", path));
                    }
                }
                _ => println!("{}", envelope),
            }
            Ok(())
        }
        RemoteCommand::BackupImport { file, session_only } => {
            let raw = read_input(file)?;
            let export_password = backup_password(false).await?;
            let at_rest = if *session_only {
                None
            } else {
                Some(at_rest_password(false).await?)
            };
            app.vault()
                .import_backup(
                    raw.trim(),
                    &export_password,
                    at_rest.as_ref().map(|p| p.as_str()),
                )
                .await?;
            if !ctx.quiet() {
                let ui = ctx.ui();
                print(ui, &badge(ui, Badge::Ok, "Remote settings restored"));
            }
            connect(ctx, &app).await;
            Ok(())
        }
    };
    app.finish().await;
    result
}

async fn configure(
    ctx: &AppContext<'_>,
    app: &App,
    endpoint: &str,
    token: Option<&str>,
    session_only: bool,
    no_input: bool,
) -> anyhow::Result<()> {
    let interactive = std::io::stdin().is_terminal() && !no_input;

    let token = match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => Zeroizing::new(token.to_string()),
        None if interactive => Zeroizing::new(
            tokio::task::spawn_blocking(|| prompt_password("Access token")).await??,
        ),
        None => {
            return Err(CliError::invalid_input(format!(
                "No access token given; pass --token or set {}",
                env::TOKEN
            ))
            .into())
        }
    };
    let password = if session_only {
        None
    } else {
        Some(at_rest_password(!interactive).await?)
    };

    let saved = app.vault().set_endpoint(endpoint)?;
    app.vault()
        .configure(&token, password.as_ref().map(|p| p.as_str()))
        .await?;

    if !ctx.quiet() {
        let ui = ctx.ui();
        print(ui, &badge(ui, Badge::Ok, "Remote configured"));
        print(ui, &kv(ui, "Endpoint", &saved));
        let kept = if session_only { "this session" } else { "saved, sealed" };
        print(ui, &kv(ui, "Token", kept));
    }
    connect(ctx, app).await;
    Ok(())
}

/// First contact after new credentials: make sure the folder directory
/// exists, then pull. Failures only warn; the credentials are already saved.
async fn connect(ctx: &AppContext<'_>, app: &App) {
    let ui = ctx.ui();
    let spinner = Spinner::new(ui, "Loading from remote");
    if let Err(e) = app.sync.bootstrap().await {
        spinner.clear();
        eprintln!(
            "{}",
            badge(ui, Badge::Warn, &format!("Could not reach the remote: {}", e))
        );
        return;
    }
    let pulled = app.sync.pull().await;
    spinner.clear();
    match pulled {
        Ok(report) if !ctx.quiet() => print_merge_report(ui, &report),
        Ok(_) => {}
        // Reported through the notice stream.
        Err(e) => debug!(error = %e, "First pull failed"),
    }
}

fn status(ctx: &AppContext<'_>, app: &App, json: bool) -> anyhow::Result<()> {
    let ui = ctx.ui().with_json(json);
    let endpoint = app.vault().endpoint()?;
    let state = app.vault().state()?;
    let active = app.sync.active_namespace()?;

    if ui.mode.is_json() {
        let value = json!({
            "endpoint": endpoint,
            "state": state.as_str(),
            "activeFolder": active,
            "pending": app.sync.has_pending(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print(&ui, &header(&ui, "remote", None));
    print(
        &ui,
        &kv(&ui, "Endpoint", endpoint.as_deref().unwrap_or("(not set)")),
    );
    print(&ui, &kv(&ui, "State", state.as_str()));
    print(&ui, &kv(&ui, "Folder", &active));
    print_state_hint(&ui, state);
    Ok(())
}

fn print_state_hint(ui: &UiContext, state: VaultState) {
    match state {
        VaultState::Unset => print(ui, &hint(ui, "exam remote configure <endpoint>")),
        VaultState::Locked => print(ui, &hint(ui, "exam remote unlock")),
        VaultState::Unlocked => {}
    }
}

/// Password that seals the token on this machine.
async fn at_rest_password(no_prompt: bool) -> anyhow::Result<Zeroizing<String>> {
    if let Some(password) = password_from_env(env::UNLOCK_PASSWORD) {
        return Ok(password);
    }
    if no_prompt || !std::io::stdin().is_terminal() {
        return Err(CliError::invalid_input(format!(
            "A password is needed to save the token; set {} or pass --session-only",
            env::UNLOCK_PASSWORD
        ))
        .into());
    }
    let password =
        tokio::task::spawn_blocking(|| prompt_new_password("Password to seal the token"))
            .await??;
    Ok(Zeroizing::new(password))
}

/// Password protecting a backup file. Exports ask twice.
async fn backup_password(confirm: bool) -> anyhow::Result<Zeroizing<String>> {
    if let Some(password) = password_from_env(env::BACKUP_PASSWORD) {
        return Ok(password);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::invalid_input(format!(
            "A backup password is needed; set {}",
            env::BACKUP_PASSWORD
        ))
        .into());
    }
    let password = tokio::task::spawn_blocking(move || {
        if confirm {
            prompt_new_password("Backup password")
        } else {
            prompt_password("Backup password")
        }
    })
    .await??;
    Ok(Zeroizing::new(password))
}

fn password_from_env(name: &str) -> Option<Zeroizing<String>> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(Zeroizing::new)
}
