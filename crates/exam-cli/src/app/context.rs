//! Application context for the exam CLI.
//!
//! Bundles the parsed arguments with the lazily-loaded config, and builds
//! the stores, vault and reconciler a command needs.

use std::path::PathBuf;
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use tracing::debug;

use exam_core::kv::{DurableKv, FileKv};
use exam_core::remote::ConfiguredRemoteStore;
use exam_core::store::SqlitePaperStore;
use exam_core::sync::{SyncOptions, SyncReconciler};
use exam_core::{CredentialVault, PaperStore};

use crate::cli::Cli;
use crate::config::{read_config, ExamConfig};
use crate::session::open_session_store;
use crate::ui::{badge, Badge, UiContext};

use super::resolver::resolve_config_path;

/// Application context that bundles CLI args with configuration.
pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<ExamConfig>,
    ui: OnceCell<UiContext>,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
            ui: OnceCell::new(),
        }
    }

    pub fn cli(&self) -> &Cli {
        self.cli
    }

    /// Check if quiet mode is enabled.
    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// Terminal context; `--ascii` or `[ui] unicode = false` turn symbols off.
    pub fn ui(&self) -> &UiContext {
        self.ui.get_or_init(|| {
            let unicode =
                !self.cli.ascii && self.config().map(|c| c.ui.unicode).unwrap_or(true);
            UiContext::from_env(false, self.cli.no_color, unicode)
        })
    }

    /// The config file, or defaults when none has been written.
    pub fn config(&self) -> anyhow::Result<&ExamConfig> {
        self.config.get_or_try_init(|| {
            let path = resolve_config_path(self.cli)?;
            if path.exists() {
                read_config(&path)
            } else {
                debug!(path = %path.display(), "No config file; using defaults");
                ExamConfig::defaults()
            }
        })
    }

    /// Open the local stores and build the reconciler.
    pub fn open(&self) -> anyhow::Result<App> {
        let config = self.config()?;
        let database = match self.cli.db.as_deref() {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => PathBuf::from(&config.storage.database),
        };
        let settings_path = PathBuf::from(&config.storage.settings);
        debug!(
            database = %database.display(),
            settings = %settings_path.display(),
            "Opening stores"
        );

        let store: Arc<dyn PaperStore> = Arc::new(SqlitePaperStore::open(&database)?);
        let settings: Arc<dyn DurableKv> = Arc::new(FileKv::new(settings_path.clone()));
        let session = open_session_store(&settings_path, config.session.ttl_seconds);
        let vault = CredentialVault::new(settings.clone(), session);
        let remote = Arc::new(ConfiguredRemoteStore::new(settings.clone()));
        let options = SyncOptions {
            quiet_period: config.quiet_period(),
            ..SyncOptions::default()
        };

        let sync = SyncReconciler::new(vault, remote, store, settings, options);
        let notices = sync.take_notices();
        Ok(App {
            sync,
            notices,
            ui: self.ui().clone(),
        })
    }
}

/// Everything a command works with.
pub struct App {
    pub sync: SyncReconciler,
    notices: Option<tokio::sync::mpsc::UnboundedReceiver<exam_core::sync::Notice>>,
    ui: UiContext,
}

impl App {
    pub fn store(&self) -> &dyn PaperStore {
        self.sync.store().as_ref()
    }

    pub fn vault(&self) -> &CredentialVault {
        self.sync.vault()
    }

    /// Save `paper` locally and schedule a push.
    pub fn save(&self, paper: &exam_core::Paper) -> anyhow::Result<()> {
        self.store().put(paper)?;
        self.sync.record_change()?;
        Ok(())
    }

    /// Print sync failures reported since the last call.
    pub fn show_notices(&mut self) {
        let Some(rx) = self.notices.as_mut() else {
            return;
        };
        while let Ok(notice) = rx.try_recv() {
            eprintln!("{}", badge(&self.ui, Badge::Warn, &notice.to_string()));
        }
    }

    /// Drop pending notices; for commands that report the error themselves.
    pub fn discard_notices(&mut self) {
        if let Some(rx) = self.notices.as_mut() {
            while rx.try_recv().is_ok() {}
        }
    }

    /// Push anything still waiting for its quiet period, then report.
    ///
    /// The local change is already saved, so a failed push is a warning
    /// rather than a failed command.
    pub async fn finish(mut self) {
        if let Err(e) = self.sync.flush().await {
            debug!(error = %e, "Flush before exit failed");
        }
        self.show_notices();
    }
}
