//! mirra: keep dotfiles mirrored across machines through a git repository.
//!
//! # Usage
//!
//! ```text
//! mirra setup [--remote <url>] [--user <name>] [--no-service]
//! mirra add <file> [--name <name>] [--no-push]
//! mirra remove <name> [--no-push]
//! mirra list [--json]
//! mirra sync [--offline]
//! mirra daemon start [--foreground] [--log-json]
//! mirra daemon stop | status [--json] | install | uninstall
//! mirra daemon logs [--lines <n>] [--stderr-only]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    add::AddArgs, daemon::DaemonCommand, list::ListArgs, remove::RemoveArgs, setup::SetupArgs,
    sync::SyncArgs, Workspace,
};
use mirra_daemon::LogOptions;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "mirra",
    version,
    about = "Mirror dotfiles between machines through a git repository",
    long_about = None,
)]
struct Cli {
    /// Configuration directory (default: ~/.config/mirra).
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone or create the repository and record it in the settings.
    Setup(SetupArgs),

    /// Move a file into the repository and replace it with a link.
    Add(AddArgs),

    /// Stop tracking a file and restore it as a regular file.
    Remove(RemoveArgs),

    /// Show tracked files and their link status.
    List(ListArgs),

    /// Push local changes, pull remote ones and repair every link.
    Sync(SyncArgs),

    /// Manage the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_dir = Workspace::resolve_config_dir(cli.config_dir)?;

    // The foreground daemon installs its own subscriber at `info`.
    let foreground_daemon = matches!(
        cli.command,
        Commands::Daemon {
            command: DaemonCommand::Start { foreground: true, .. }
        }
    );
    if !foreground_daemon {
        mirra_daemon::init_tracing(
            "warn",
            LogOptions {
                verbose: cli.verbose,
                json: false,
            },
        );
    }

    match cli.command {
        Commands::Setup(args) => args.run(&Workspace::load(config_dir)?),
        Commands::Add(args) => args.run(&Workspace::load(config_dir)?),
        Commands::Remove(args) => args.run(&Workspace::load(config_dir)?),
        Commands::List(args) => args.run(&Workspace::load(config_dir)?),
        Commands::Sync(args) => args.run(&Workspace::load(config_dir)?),
        Commands::Daemon { command } => commands::daemon::run(command, &config_dir, cli.verbose),
    }
}
