//! `mirra remove`: stop tracking a file.

use std::fs;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use mirra_core::{paths, types::EntryName};
use mirra_sync::link;

use super::Workspace;

/// Arguments for `mirra remove`.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Entry name as shown by `mirra list`.
    pub name: String,

    /// Skip the commit and push.
    #[arg(long)]
    pub no_push: bool,
}

impl RemoveArgs {
    pub fn run(self, ws: &Workspace) -> Result<()> {
        let name = EntryName::from(self.name);
        let mut manifest = ws.manifest()?;
        let entry = manifest
            .remove(&name)
            .with_context(|| format!("no entry named '{name}'"))?;
        let canonical = ws.canonical_path(&entry.source);

        if let Some(target) = paths::resolve_at(&ws.home, &entry, &ws.platform) {
            if canonical.exists() {
                link::restore_file(&target, &canonical)
                    .with_context(|| format!("failed to restore {}", target.display()))?;
                println!("{} restored {}", "✓".green(), target.display());
            }
        }

        if canonical.exists() {
            fs::remove_file(&canonical)
                .with_context(|| format!("failed to delete {}", canonical.display()))?;
        }
        ws.save_manifest(&manifest)?;
        println!("{} no longer tracking {name}", "✓".green());

        if !self.no_push {
            ws.publish(&format!("Remove {name}"));
        }
        Ok(())
    }
}
