use std::path::PathBuf;

use crate::app::{resolve_config_path, AppContext};
use crate::cli::InitArgs;
use crate::config::{write_config, ExamConfig};
use crate::errors::CliError;
use crate::ui::{badge, hint, kv, print, Badge};

pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    let config_path = resolve_config_path(ctx.cli())?;
    if config_path.exists() && !args.force {
        return Err(CliError::invalid_input(format!(
            "Config already exists at {}; pass --force to overwrite it",
            config_path.display()
        ))
        .into());
    }

    let mut config = ExamConfig::defaults()?;
    if let Some(database) = args.database.as_deref().or(ctx.cli().db.as_deref()) {
        config.storage.database = PathBuf::from(database).to_string_lossy().to_string();
    }
    if let Some(settings) = args.settings.as_deref() {
        config.storage.settings = settings.to_string();
    }
    if let Some(ms) = args.quiet_period_ms {
        config.sync.quiet_period_ms = ms;
    }
    if let Some(ttl) = args.session_ttl_seconds {
        config.session.ttl_seconds = ttl;
    }
    if ctx.cli().ascii {
        config.ui.unicode = false;
    }

    write_config(&config_path, &config)?;

    if !ctx.quiet() {
        let ui = ctx.ui();
        print(ui, &badge(ui, Badge::Ok, "Config written"));
        print(ui, &kv(ui, "Config", &config_path.to_string_lossy()));
        print(ui, &kv(ui, "Database", &config.storage.database));
        print(ui, &kv(ui, "Settings", &config.storage.settings));
        print(ui, &hint(ui, "exam paper new \"My first paper\""));
    }
    Ok(())
}
