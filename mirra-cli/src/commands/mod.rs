pub mod add;
pub mod daemon;
pub mod list;
pub mod remove;
pub mod setup;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use mirra_core::{
    config, paths,
    types::{LocalSettings, Manifest, Platform},
};
use mirra_sync::{GitCli, VersionControl};

/// Settings and directories shared by every file command.
pub struct Workspace {
    pub config_dir: PathBuf,
    pub settings: LocalSettings,
    pub repo_dir: PathBuf,
    pub home: PathBuf,
    pub platform: Platform,
}

impl Workspace {
    /// `--config-dir` made absolute, or `~/.config/mirra`.
    pub fn resolve_config_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
        match flag {
            Some(dir) => Ok(paths::normalize(&dir)),
            None => config::default_config_dir().context("could not determine config directory"),
        }
    }

    pub fn load(config_dir: PathBuf) -> Result<Self> {
        let settings = config::load_settings_at(&config_dir)
            .with_context(|| format!("failed to load settings from {}", config_dir.display()))?;
        let repo_dir = config::repo_dir(&config_dir, &settings);
        let home = paths::home_dir().context("could not determine home directory")?;
        Ok(Self {
            config_dir,
            settings,
            repo_dir,
            home,
            platform: Platform::current(),
        })
    }

    pub fn manifest(&self) -> Result<Manifest> {
        config::load_manifest_at(&self.repo_dir).with_context(|| {
            format!("failed to load manifest from {}", self.repo_dir.display())
        })
    }

    pub fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        config::save_manifest_at(&self.repo_dir, manifest)
            .with_context(|| format!("failed to save manifest in {}", self.repo_dir.display()))
    }

    pub fn canonical_path(&self, source: &Path) -> PathBuf {
        paths::normalize(&self.repo_dir.join(source))
    }

    /// Commit and push `message`; failures are reported, not fatal.
    pub fn publish(&self, message: &str) {
        let git = GitCli::new();
        let result = git
            .init(&self.repo_dir)
            .and_then(|_| git.commit_and_push(&self.repo_dir, message));
        match result {
            Ok(true) => println!("pushed: {message}"),
            Ok(false) => {}
            Err(err) => eprintln!("{} {err}", "warning: push failed:".yellow()),
        }
    }
}
