use exam_core::sync::{MergeReport, PushOutcome};

use crate::app::{ensure_unlocked, AppContext};
use crate::cli::SyncCommand;
use crate::ui::render::sync_status;
use crate::ui::{badge, kv, print, Badge, Spinner, UiContext};

pub async fn handle_sync(ctx: &AppContext<'_>, command: &SyncCommand) -> anyhow::Result<()> {
    let mut app = ctx.open()?;
    let ui = ctx.ui();
    let unlocked = ensure_unlocked(&app, false).await?;

    let result = match command {
        SyncCommand::Push => {
            let spinner = Spinner::new(ui, "Saving to remote");
            let outcome = app.sync.save_now().await;
            spinner.clear();
            match outcome {
                Ok(PushOutcome::Pushed { papers }) => {
                    if !ctx.quiet() {
                        print(ui, &badge(ui, Badge::Ok, &format!("Pushed {} papers", papers)));
                        print(ui, &kv(ui, "Folder", &app.sync.active_namespace()?));
                    }
                    Ok(())
                }
                Ok(PushOutcome::Superseded) => {
                    print(ui, &badge(ui, Badge::Info, "Superseded by a newer push"));
                    Ok(())
                }
                Err(e) => {
                    app.discard_notices();
                    Err(e.into())
                }
            }
        }
        SyncCommand::Pull => {
            let pulled = match unlocked {
                // Unlocking already pulled.
                Some(report) => Ok(report),
                None => {
                    let spinner = Spinner::new(ui, "Loading from remote");
                    let pulled = app.sync.pull().await;
                    spinner.clear();
                    pulled
                }
            };
            match pulled {
                Ok(report) => {
                    if !ctx.quiet() {
                        print_merge_report(ui, &report);
                        print(ui, &sync_status(ui, &app.sync.status()));
                    }
                    Ok(())
                }
                Err(e) => {
                    app.discard_notices();
                    Err(e.into())
                }
            }
        }
    };
    app.finish().await;
    result
}

pub(super) fn print_merge_report(ui: &UiContext, report: &MergeReport) {
    let summary = format!(
        "Loaded {} papers ({} new, {} updated, {} unchanged)",
        report.total(),
        report.inserted,
        report.updated,
        report.unchanged
    );
    print(ui, &badge(ui, Badge::Ok, &summary));
    if report.skipped > 0 {
        eprintln!(
            "{}",
            badge(
                ui,
                Badge::Warn,
                &format!("Skipped {} malformed remote papers", report.skipped)
            )
        );
    }
}
