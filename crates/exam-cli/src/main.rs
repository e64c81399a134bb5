//! Exam CLI - self-graded question papers with encrypted remote sync
//!
//! Command-line front end for exam-core: paper editing, the answer key,
//! remote credentials and folder sync.

use clap::{CommandFactory, Parser};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod session;
mod ui;

use app::AppContext;
use cli::{Cli, Commands};
use commands::{
    handle_completions, handle_edit, handle_folder, handle_grade, handle_init, handle_paper,
    handle_remote, handle_score, handle_sync, handle_take, Edit,
};
use constants::env;
use errors::{exit_code_for, CliError};
use exam_core::ExamError;

fn main() {
    let cli = Cli::parse();

    // The cache daemon is a long-lived child; it runs without a runtime.
    if let Some(Commands::InternalCacheDaemon(args)) = &cli.command {
        let ttl = std::time::Duration::from_secs(args.ttl);
        if let Err(e) = session::run_cache_daemon(ttl, std::path::Path::new(&args.socket)) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    setup_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let ctx = AppContext::new(&cli);
    if let Err(e) = runtime.block_on(run(&ctx)) {
        report_error(&e);
        std::process::exit(exit_code_for(&e));
    }
}

fn setup_tracing(verbose: u8) {
    let filter = match std::env::var(env::LOG) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        // Sync failures already reach the user as notices; tracing's own
        // warnings only show with -v.
        _ => EnvFilter::new(match verbose {
            0 => "error",
            1 => "warn",
            2 => "info",
            _ => "debug",
        }),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Print `err` with its hint. Core errors get the same wording as the
/// CLI's own.
fn report_error(err: &anyhow::Error) {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        eprintln!("Error: {}", cli);
        return;
    }
    if let Some(core) = err.downcast_ref::<ExamError>() {
        if let Some(cli) = describe(core) {
            eprintln!("Error: {}", cli);
            return;
        }
    }
    eprintln!("Error: {:#}", err);
}

/// Rebuild a core error as a CLI error for display, without consuming it.
fn describe(err: &ExamError) -> Option<CliError> {
    let copy = match err {
        ExamError::NotFound(what) => ExamError::NotFound(what.clone()),
        ExamError::NotConfigured => ExamError::NotConfigured,
        ExamError::Locked => ExamError::Locked,
        ExamError::Unauthorized => ExamError::Unauthorized,
        ExamError::Decryption => ExamError::Decryption,
        _ => return None,
    };
    Some(CliError::from(copy))
}

async fn run(ctx: &AppContext<'_>) -> anyhow::Result<()> {
    let Some(command) = &ctx.cli().command else {
        let mut cmd = Cli::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Init(args) => handle_init(ctx, args),
        Commands::Paper(args) => handle_paper(ctx, &args.command).await,
        Commands::Answer(args) => handle_edit(ctx, &args.target, Edit::Answer(&args.text)).await,
        Commands::Key(args) => handle_edit(ctx, &args.target, Edit::Key(&args.text)).await,
        Commands::Memo(args) => handle_edit(ctx, &args.target, Edit::Memo(&args.text)).await,
        Commands::Choose(args) => {
            handle_edit(ctx, &args.target, Edit::Choose(args.option.as_deref())).await
        }
        Commands::Star(target) => handle_edit(ctx, target, Edit::Star).await,
        Commands::Kind(target) => handle_edit(ctx, target, Edit::Kind).await,
        Commands::Score(args) => handle_score(ctx, args),
        Commands::Take(args) => handle_take(ctx, args).await,
        Commands::Grade(args) => handle_grade(ctx, args).await,
        Commands::Remote(args) => handle_remote(ctx, &args.command).await,
        Commands::Sync(args) => handle_sync(ctx, &args.command).await,
        Commands::Ns(args) => handle_folder(ctx, &args.command).await,
        Commands::Completions(args) => handle_completions(args.shell),
        Commands::InternalCacheDaemon(_) => Ok(()),
    }
}
