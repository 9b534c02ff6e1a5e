//! Outlay CLI - Command-line interface for the Outlay expense tracker
//!
//! Provides commands for:
//! - Recording, editing, listing and deleting expenses
//! - Viewing sync status and the pending queue
//! - Triggering a sync
//! - Managing configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use outlay_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    add::AddCommand, completions::CompletionsCommand, config::ConfigCommand,
    delete::DeleteCommand, edit::EditCommand, list::ListCommand, show::ShowCommand,
    status::StatusCommand, sync::SyncCommand,
};
use context::GlobalArgs;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "outlay", version, about = "Offline-first expense tracker")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Do not probe the network; treat it as unreachable
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record a new expense
    Add(AddCommand),
    /// Change fields of an existing expense
    Edit(EditCommand),
    /// List expenses, newest first
    List(ListCommand),
    /// Show a single expense
    Show(ShowCommand),
    /// Delete an expense
    Delete(DeleteCommand),
    /// Show synchronization status
    Status(StatusCommand),
    /// Send pending changes to the remote
    Sync(SyncCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let global = GlobalArgs {
        config: cli.config,
        offline: cli.offline,
        quiet: cli.quiet,
    };

    // Logs go to stderr so --json output stays parseable
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error".to_string(),
        (false, 0) => Config::load_or_default(&global.config_path()).logging.level,
        (false, 1) => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Add(cmd) => cmd.execute(&global, format).await,
        Commands::Edit(cmd) => cmd.execute(&global, format).await,
        Commands::List(cmd) => cmd.execute(&global, format).await,
        Commands::Show(cmd) => cmd.execute(&global, format).await,
        Commands::Delete(cmd) => cmd.execute(&global, format).await,
        Commands::Status(cmd) => cmd.execute(&global, format).await,
        Commands::Sync(cmd) => cmd.execute(&global, format).await,
        Commands::Config(cmd) => cmd.execute(&global, format).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}
