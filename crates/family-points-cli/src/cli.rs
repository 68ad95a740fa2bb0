use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "fpoints")]
#[command(about = "Keep the family points document in sync with a private Gist")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the local points document
    #[arg(long, global = true, value_name = "PATH")]
    pub data: Option<PathBuf>,

    /// Path to the sync config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the sync configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Manage the remote document
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },
    /// Run a single sync flow
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Download at start, then upload local changes as they happen
    Watch {
        /// Quiet period before changes are uploaded
        #[arg(long, value_name = "MS", default_value = "2500")]
        debounce_ms: u64,
        /// How often the local document is checked for changes
        #[arg(long, value_name = "MS", default_value = "1000")]
        poll_ms: u64,
    },
    /// Delete the local document, keeping the sync configuration
    Reset,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Save the remote id and token
    Init {
        /// Gist id of the remote document
        #[arg(long, value_name = "ID")]
        remote_id: Option<String>,
        /// GitHub token with the gist scope
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Enable automatic download and upload
        #[arg(long)]
        auto_sync: bool,
        /// Save without checking that the remote document is reachable
        #[arg(long)]
        skip_validate: bool,
    },
    /// Print the current configuration
    Show,
    /// Forget the remote id, token and sync state
    Clear,
}

#[derive(Subcommand)]
pub enum RemoteCommands {
    /// Create a new private Gist from the local document and use it
    Create,
    /// Check that the configured Gist is reachable
    Validate,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show the sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download the remote document if it is newer
    Download,
    /// Upload the local document unless the remote is newer
    Upload,
    /// Replace local data with the remote document
    Pull,
    /// Overwrite the remote document with local data
    Push,
}
