use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;

use exam_core::VERSION;

use crate::constants::env;

/// Exam - self-graded question papers with encrypted remote sync
#[derive(Parser)]
#[command(name = "exam")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file
    #[arg(long, global = true, env = env::CONFIG)]
    pub config: Option<String>,

    /// Path to the paper database (overrides the config)
    #[arg(long, global = true, env = env::DATABASE)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More log output on stderr (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Use ASCII symbols only
    #[arg(long, global = true)]
    pub ascii: bool,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Paper database path
    #[arg(long, value_name = "PATH")]
    pub database: Option<String>,

    /// Settings file path (endpoint, sealed token, active folder)
    #[arg(long, value_name = "PATH")]
    pub settings: Option<String>,

    /// Quiet period before an edit is pushed, in milliseconds
    #[arg(long)]
    pub quiet_period_ms: Option<u64>,

    /// How long an unlocked token stays cached (0 disables the cache)
    #[arg(long)]
    pub session_ttl_seconds: Option<u64>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct PaperArgs {
    #[command(subcommand)]
    pub command: PaperCommand,
}

#[derive(Subcommand)]
pub enum PaperCommand {
    /// Create a paper
    New {
        /// Paper title
        title: String,

        /// Optional subtitle
        #[arg(long)]
        subtitle: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List papers, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a paper with its questions
    Show {
        /// Paper id or unique id prefix
        paper: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a paper
    Delete {
        /// Paper id or unique id prefix
        paper: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Duplicate a paper with fresh ids
    Copy {
        /// Paper id or unique id prefix
        paper: String,
    },

    /// Export papers as JSON
    Export {
        /// Only these papers (default: all)
        #[arg(value_name = "PAPER")]
        papers: Vec<String>,

        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<String>,
    },

    /// Import papers from a JSON export
    Import {
        /// File to read ("-" for stdin)
        #[arg(value_name = "FILE")]
        file: String,
    },
}

/// Address of one question
#[derive(Args)]
pub struct QuestionRef {
    /// Paper id or unique id prefix
    pub paper: String,

    /// Question number, starting at 1
    pub question: usize,
}

#[derive(Args)]
pub struct AnswerArgs {
    #[command(flatten)]
    pub target: QuestionRef,

    /// The answer text
    pub text: String,
}

#[derive(Args)]
pub struct ChooseArgs {
    #[command(flatten)]
    pub target: QuestionRef,

    /// A, B or C; omit to clear the selection
    pub option: Option<String>,
}

#[derive(Args)]
pub struct PaperRefArgs {
    /// Paper id or unique id prefix
    pub paper: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub paper: PaperRefArgs,

    /// List questions tagged A, B, C or none (repeatable)
    #[arg(long = "option", value_name = "TAG")]
    pub options: Vec<String>,

    /// List questions answered correctly
    #[arg(long)]
    pub correct: bool,

    /// List questions answered wrongly
    #[arg(long)]
    pub wrong: bool,

    /// List starred questions only
    #[arg(long)]
    pub starred: bool,

    /// List every graded question
    #[arg(long)]
    pub list: bool,
}

#[derive(Args)]
pub struct RemoteArgs {
    #[command(subcommand)]
    pub command: RemoteCommand,
}

#[derive(Subcommand)]
pub enum RemoteCommand {
    /// Set the endpoint and access token
    Configure {
        /// Remote endpoint (https is assumed)
        endpoint: String,

        /// Access token (prompted for if absent)
        #[arg(long, env = env::TOKEN, hide_env_values = true)]
        token: Option<String>,

        /// Keep the token for this session only; nothing is saved
        #[arg(long)]
        session_only: bool,

        /// Disable interactive prompts
        #[arg(long)]
        no_input: bool,
    },

    /// Unlock the saved token and pull the active folder
    Unlock {
        /// Disable interactive prompts
        #[arg(long)]
        no_input: bool,
    },

    /// Forget the saved and session token
    Forget,

    /// Show endpoint, lock state and active folder
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a random access token
    GenerateToken {
        /// Use the generated token for this session
        #[arg(long)]
        adopt: bool,
    },

    /// Check that the endpoint accepts the token
    Test,

    /// Write endpoint and token to a password-protected backup
    BackupExport {
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<String>,
    },

    /// Restore endpoint and token from a backup
    BackupImport {
        /// Backup file ("-" for stdin)
        #[arg(value_name = "FILE")]
        file: String,

        /// Keep the restored token for this session only
        #[arg(long)]
        session_only: bool,
    },
}

#[derive(Args)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub command: SyncCommand,
}

#[derive(Subcommand)]
pub enum SyncCommand {
    /// Push the local papers to the active folder now
    Push,

    /// Merge the active folder's papers into the local ones
    Pull,
}

#[derive(Args)]
pub struct FolderArgs {
    #[command(subcommand)]
    pub command: FolderCommand,
}

#[derive(Subcommand)]
pub enum FolderCommand {
    /// List folders
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a folder
    Add {
        /// Display name
        alias: Option<String>,
    },

    /// Rename a folder
    Rename {
        /// Folder key
        key: String,

        /// New display name (omit to reset it to the key)
        alias: Option<String>,
    },

    /// Delete a folder and its remote papers
    Remove {
        /// Folder key
        key: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Make another folder active, replacing the local papers with its own
    Switch {
        /// Folder key
        key: String,
    },
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}

/// Arguments for the internal cache daemon command
#[derive(Args)]
pub struct InternalCacheDaemonArgs {
    #[arg(long)]
    pub ttl: u64,
    #[arg(long)]
    pub socket: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a config file with default paths
    Init(InitArgs),

    /// Create, list, copy, export and import papers
    Paper(PaperArgs),

    /// Answer one question
    Answer(AnswerArgs),

    /// Set the correct answer of one question
    Key(AnswerArgs),

    /// Attach a memo to one question
    Memo(AnswerArgs),

    /// Select a multiple-choice option on one question
    Choose(ChooseArgs),

    /// Star or unstar one question
    Star(QuestionRef),

    /// Switch one question between short and long answers
    Kind(QuestionRef),

    /// Show how a paper scores against its answer key
    Score(ScoreArgs),

    /// Answer a paper question by question
    Take(PaperRefArgs),

    /// Fill in the answer key question by question
    Grade(PaperRefArgs),

    /// Configure and unlock remote sync
    Remote(RemoteArgs),

    /// Push or pull the active folder
    Sync(SyncArgs),

    /// Manage remote folders
    #[command(name = "ns", alias = "folder")]
    Ns(FolderArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),

    /// Internal cache daemon (not user-facing)
    #[command(hide = true, name = "internal-cache-daemon")]
    InternalCacheDaemon(InternalCacheDaemonArgs),
}
