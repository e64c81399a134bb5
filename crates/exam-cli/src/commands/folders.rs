use serde_json::json;

use crate::app::{confirm, ensure_unlocked, AppContext};
use crate::cli::FolderCommand;
use crate::errors::CliError;
use crate::ui::{badge, hint, kv, print, table, Badge, Column, Spinner};

use super::sync::print_merge_report;

pub async fn handle_folder(ctx: &AppContext<'_>, command: &FolderCommand) -> anyhow::Result<()> {
    let mut app = ctx.open()?;
    ensure_unlocked(&app, false).await?;
    let ui = ctx.ui();

    let result = match command {
        FolderCommand::List { json } => {
            let folders = app.sync.namespaces().await?;
            let active = app.sync.active_namespace()?;
            let ui = ui.with_json(*json);
            if ui.mode.is_json() {
                let value = json!({ "active": active, "folders": folders });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                let columns = [Column::new(""), Column::new("Key"), Column::new("Name")];
                let rows: Vec<Vec<String>> = folders
                    .iter()
                    .map(|folder| {
                        vec![
                            if folder.key == active { "*" } else { "" }.to_string(),
                            folder.key.clone(),
                            folder.alias.clone(),
                        ]
                    })
                    .collect();
                print(&ui, &table(&ui, &columns, &rows));
            }
            Ok(())
        }
        FolderCommand::Add { alias } => {
            let key = app
                .sync
                .add_namespace(alias.as_deref().unwrap_or(""))
                .await?;
            if !ctx.quiet() {
                print(ui, &badge(ui, Badge::Ok, "Folder created"));
                print(ui, &kv(ui, "Key", &key));
                print(ui, &hint(ui, &format!("exam ns switch {}", key)));
            }
            Ok(())
        }
        FolderCommand::Rename { key, alias } => {
            app.sync
                .rename_namespace(key, alias.as_deref().unwrap_or(""))
                .await?;
            if !ctx.quiet() {
                print(ui, &badge(ui, Badge::Ok, "Folder renamed"));
            }
            Ok(())
        }
        FolderCommand::Remove { key, yes } => {
            if !yes {
                if !ui.is_interactive() {
                    return Err(CliError::invalid_input(
                        "Refusing to remove a folder without confirmation; pass --yes",
                    )
                    .into());
                }
                let prompt = format!("Remove folder {} and its remote papers?", key);
                let confirmed = tokio::task::spawn_blocking(move || confirm(&prompt)).await??;
                if !confirmed {
                    return Ok(());
                }
            }
            app.sync.remove_namespace(key).await?;
            if !ctx.quiet() {
                print(ui, &badge(ui, Badge::Ok, &format!("Removed folder {}", key)));
            }
            Ok(())
        }
        FolderCommand::Switch { key } => {
            let spinner = Spinner::new(ui, "Switching folder");
            let switched = app.sync.switch_namespace(key).await;
            spinner.clear();
            match switched {
                Ok(report) => {
                    if !ctx.quiet() {
                        print(ui, &badge(ui, Badge::Ok, &format!("Active folder: {}", key)));
                        print_merge_report(ui, &report);
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
