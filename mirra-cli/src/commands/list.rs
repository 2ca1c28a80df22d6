//! `mirra list`: tracked files and their link status.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use mirra_core::paths;
use mirra_sync::{entry_status_at, EntryStatus};

use super::Workspace;

/// Arguments for `mirra list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ListRow {
    name: String,
    source: String,
    target: Option<String>,
    status: EntryStatus,
}

#[derive(Tabled)]
struct ListTableRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "status")]
    status: String,
}

impl ListArgs {
    pub fn run(self, ws: &Workspace) -> Result<()> {
        let manifest = ws.manifest()?;
        let rows: Vec<ListRow> = manifest
            .files
            .iter()
            .map(|entry| {
                let (target, status) =
                    entry_status_at(&ws.home, entry, &ws.repo_dir, &ws.platform);
                ListRow {
                    name: entry.name.0.clone(),
                    source: entry.source.display().to_string(),
                    target: target.map(|t| paths::tilde_path_at(&ws.home, &t)),
                    status,
                }
            })
            .collect();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize list JSON")?
            );
            return Ok(());
        }

        if rows.is_empty() {
            println!("No files tracked. Run `mirra add <file>` to start.");
            return Ok(());
        }

        let table_rows: Vec<ListTableRow> = rows
            .into_iter()
            .map(|row| ListTableRow {
                name: row.name,
                target: row.target.unwrap_or_else(|| "-".to_string()),
                status: colorize(row.status),
            })
            .collect();
        let mut table = Table::new(table_rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn colorize(status: EntryStatus) -> String {
    let label = status.to_string();
    match status {
        EntryStatus::Synced => label.green().to_string(),
        EntryStatus::Missing => label.red().to_string(),
        EntryStatus::Unlinked => label.yellow().to_string(),
        EntryStatus::NoTarget => label.bright_black().to_string(),
    }
}
