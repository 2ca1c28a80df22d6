//! `mirra add`: start tracking a file.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use mirra_core::{
    paths,
    types::{Entry, EntryName},
};
use mirra_sync::{link, reconcile_all_at, LinkOutcome, SyncError};

use super::Workspace;

/// Arguments for `mirra add`.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// File to track.
    pub file: PathBuf,

    /// Entry name (defaults to the file name without its leading dot).
    #[arg(long)]
    pub name: Option<String>,

    /// Skip the commit and push.
    #[arg(long)]
    pub no_push: bool,
}

impl AddArgs {
    pub fn run(self, ws: &Workspace) -> Result<()> {
        let path = paths::normalize(&self.file);
        let meta = fs::symlink_metadata(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        if meta.file_type().is_symlink() {
            bail!("{} is already a link", path.display());
        }
        if !meta.is_file() {
            bail!("{} is not a regular file", path.display());
        }

        let name = match self.name {
            Some(name) => {
                check_name(&name)?;
                name
            }
            None => default_name(&path)?,
        };
        let name = EntryName::from(name);
        let target = paths::tilde_path_at(&ws.home, &path);
        let mut manifest = ws.manifest()?;

        if let Some(existing) = manifest.find(&name).cloned() {
            // Tracked from another machine: keep the canonical copy and
            // treat the local file as a conflict.
            let entry = existing.with_target(&ws.platform, target);
            manifest.upsert(entry.clone());
            ws.save_manifest(&manifest)?;
            let reports = reconcile_all_at(&ws.home, &[entry], &ws.repo_dir, &ws.platform);
            for report in &reports {
                if let LinkOutcome::Failed { reason } = &report.outcome {
                    bail!("failed to link {}: {reason}", path.display());
                }
                println!("{} {name}: {}", "✓".green(), report.outcome);
            }
        } else {
            let entry = Entry::new(name.clone(), PathBuf::from(&name.0))
                .with_target(&ws.platform, target);
            let canonical = ws.canonical_path(&entry.source);
            if canonical.exists() {
                bail!(
                    "{} already exists in the repository; pick another --name",
                    canonical.display()
                );
            }
            adopt(&path, &canonical)?;
            manifest.upsert(entry);
            ws.save_manifest(&manifest)?;
            println!("{} tracking {name} → {}", "✓".green(), canonical.display());
        }

        if !self.no_push {
            ws.publish(&format!("Add {name}"));
        }
        Ok(())
    }
}

/// Copy `path` into the repository, then swap it for a link.
fn adopt(path: &Path, canonical: &Path) -> Result<()> {
    adopt_with(path, canonical, link::create_link)
}

fn adopt_with(
    path: &Path,
    canonical: &Path,
    make_link: impl FnOnce(&Path, &Path) -> Result<(), SyncError>,
) -> Result<()> {
    link::copy_file(path, canonical)
        .with_context(|| format!("failed to copy {} into the repository", path.display()))?;
    fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
    let Err(err) = make_link(canonical, path) else {
        return Ok(());
    };

    // Put the original back rather than leave the path empty.
    match link::copy_file(canonical, path) {
        Ok(()) => Err(err).with_context(|| format!("failed to link {}", path.display())),
        Err(restore) => Err(err).with_context(|| {
            format!(
                "failed to link {} and could not restore it ({restore}); its content is at {}",
                path.display(),
                canonical.display()
            )
        }),
    }
}

/// Entry names become file names in the repository.
fn check_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let single_file_name = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_file_name || name.contains(['/', '\\']) {
        bail!("invalid entry name '{name}': use a plain file name");
    }
    Ok(())
}

fn default_name(path: &Path) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    let trimmed = file_name.trim_start_matches('.');
    if trimmed.is_empty() {
        bail!("cannot derive a name from {}; pass --name", path.display());
    }
    Ok(trimmed.to_string())
}
