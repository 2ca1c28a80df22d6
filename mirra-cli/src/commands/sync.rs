//! `mirra sync`: one manual reconciliation round.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use mirra_sync::{reconcile_all_at, EntryReport, GitCli, LinkOutcome, VersionControl};

use super::Workspace;

/// Arguments for `mirra sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Only repair links; do not pull or push.
    #[arg(long)]
    pub offline: bool,
}

impl SyncArgs {
    pub fn run(self, ws: &Workspace) -> Result<()> {
        if !self.offline {
            exchange(ws);
        }

        let manifest = ws.manifest()?;
        if manifest.files.is_empty() {
            println!("No files tracked. Run `mirra add <file>` to start.");
            return Ok(());
        }

        let reports = reconcile_all_at(&ws.home, &manifest.files, &ws.repo_dir, &ws.platform);
        for report in &reports {
            print_report(report);
        }

        let failed = reports
            .iter()
            .filter(|r| matches!(r.outcome, LinkOutcome::Failed { .. }))
            .count();
        if failed > 0 {
            bail!("{failed} of {} entries failed", reports.len());
        }
        Ok(())
    }
}

/// Push local edits, then pull. Failures are reported and the link repair
/// still runs.
fn exchange(ws: &Workspace) {
    if !ws.repo_dir.join(".git").exists() {
        let remote = ws.settings.remote_url.as_deref().unwrap_or("no remote configured");
        println!(
            "{} {} is not a git repository ({remote}); skipping pull and push",
            "!".yellow(),
            ws.repo_dir.display()
        );
        return;
    }

    let git = GitCli::new();
    match git.has_changes(&ws.repo_dir) {
        Ok(true) => ws.publish("Sync local changes"),
        Ok(false) => {}
        Err(err) => eprintln!("{} {err}", "warning: status failed:".yellow()),
    }
    match git.pull(&ws.repo_dir) {
        Ok(true) => println!("{} pulled remote changes", "✓".green()),
        Ok(false) => println!("{} already up to date", "·".bright_black()),
        Err(err) => eprintln!("{} {err}", "warning: pull failed:".yellow()),
    }
}

fn print_report(report: &EntryReport) {
    let target = report
        .target
        .as_ref()
        .map(|t| t.display().to_string())
        .unwrap_or_else(|| "-".to_string());
    let marker = match &report.outcome {
        LinkOutcome::Failed { .. } => "✗".red(),
        LinkOutcome::SkippedNoTarget | LinkOutcome::AlreadyCorrect => "·".bright_black(),
        _ => "✓".green(),
    };
    println!("{marker} {} {target}: {}", report.name, report.outcome);
}
