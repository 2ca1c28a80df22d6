//! `mirra daemon`: background sync lifecycle and auto-start units.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use mirra_core::{paths, types::Platform};
use mirra_daemon::paths::{stderr_log_path, stdout_log_path};
use mirra_daemon::{
    installer_for, lifecycle, start_blocking, DetachedSpawner, LogOptions, ProcessSpawner,
    ServiceSpec,
};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Start the daemon (in the background unless --foreground).
    Start {
        /// Run in this process until SIGINT / SIGTERM.
        #[arg(long)]
        foreground: bool,

        /// Write logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },
    /// Send SIGTERM to the running daemon.
    Stop,
    /// Report whether the daemon is running.
    Status {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
    /// Install and start the auto-start unit for this platform.
    Install,
    /// Stop and remove the auto-start unit.
    Uninstall,
    /// Print recent daemon log lines.
    Logs(DaemonLogsArgs),
}

#[derive(Args, Debug)]
pub struct DaemonLogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,

    /// Show only stderr log file.
    #[arg(long)]
    pub stderr_only: bool,
}

pub fn run(command: DaemonCommand, config_dir: &Path, verbose: bool) -> Result<()> {
    match command {
        DaemonCommand::Start {
            foreground: true,
            log_json,
        } => {
            start_blocking(
                config_dir,
                LogOptions {
                    verbose,
                    json: log_json,
                },
            )
            .context("daemon exited with error")?;
        }
        DaemonCommand::Start {
            foreground: false, ..
        } => {
            let status = lifecycle::status(config_dir).context("failed to read daemon status")?;
            if let Some(pid) = status.pid {
                println!("daemon is already running (pid {pid})");
                return Ok(());
            }
            let pid = DetachedSpawner::current_exe()
                .and_then(|spawner| spawner.spawn_daemon(config_dir, verbose))
                .context("failed to start daemon")?;
            println!("daemon started (pid {pid})");
        }
        DaemonCommand::Stop => {
            let status = lifecycle::status(config_dir).context("failed to read daemon status")?;
            match status.pid {
                Some(pid) => {
                    lifecycle::stop(config_dir, pid).context("failed to stop daemon")?;
                    println!("daemon stop requested (pid {pid})");
                }
                None => println!("daemon is not running"),
            }
        }
        DaemonCommand::Status { json } => {
            let status = lifecycle::status(config_dir).context("failed to read daemon status")?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status)
                        .context("failed to render daemon status JSON")?
                );
            } else {
                match status.pid {
                    Some(pid) => println!("daemon is running (pid {pid})"),
                    None => println!("daemon is not running"),
                }
            }
        }
        DaemonCommand::Install => {
            let spec = service_spec(config_dir)?;
            let installer = installer_for(&Platform::current(), spec);
            let path = installer
                .install()
                .with_context(|| format!("failed to install {} service", installer.manager()))?;
            println!(
                "installed {} service: {}",
                installer.manager(),
                path.display()
            );
        }
        DaemonCommand::Uninstall => {
            let spec = service_spec(config_dir)?;
            let installer = installer_for(&Platform::current(), spec);
            installer
                .uninstall()
                .with_context(|| format!("failed to uninstall {} service", installer.manager()))?;
            println!("uninstalled {} service", installer.manager());
        }
        DaemonCommand::Logs(args) => {
            if args.stderr_only {
                print_tail(&stderr_log_path(config_dir), args.lines)
                    .context("failed to read daemon stderr log")?;
            } else {
                print_tail(&stdout_log_path(config_dir), args.lines)
                    .context("failed to read daemon stdout log")?;
                print_tail(&stderr_log_path(config_dir), args.lines)
                    .context("failed to read daemon stderr log")?;
            }
        }
    }

    Ok(())
}

pub(super) fn service_spec(config_dir: &Path) -> Result<ServiceSpec> {
    Ok(ServiceSpec {
        binary: std::env::current_exe().context("could not locate the mirra executable")?,
        config_dir: config_dir.to_path_buf(),
        home: paths::home_dir().context("could not determine home directory")?,
    })
}

fn print_tail(path: &Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if lines == 0 {
            continue;
        }
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
