//! `mirra setup`: put a repository at `<config>/repo` and record it.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use mirra_core::{config, types::Manifest};
use mirra_daemon::installer_for;
use mirra_sync::{GhCli, GitCli, DEFAULT_REPO_NAME};

use super::{daemon::service_spec, Workspace};

/// Arguments for `mirra setup`.
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Clone this remote instead of creating one with `gh`.
    #[arg(long, value_name = "URL")]
    pub remote: Option<String>,

    /// GitHub user that owns the repository (detected when omitted).
    #[arg(long)]
    pub user: Option<String>,

    /// Repository name to find or create with `gh`.
    #[arg(long, default_value = DEFAULT_REPO_NAME)]
    pub repo_name: String,

    /// Do not install the auto-start unit.
    #[arg(long)]
    pub no_service: bool,
}

impl SetupArgs {
    pub fn run(self, ws: &Workspace) -> Result<()> {
        let remote = match self.remote.clone().or_else(|| ws.settings.remote_url.clone()) {
            Some(url) => Some(url),
            None => self.hosted_remote()?,
        };

        let git = GitCli::new();
        let repo = &ws.repo_dir;
        if repo.join(".git").exists() {
            println!("{} repository already at {}", "✓".green(), repo.display());
            if let Some(url) = &remote {
                git.set_remote(repo, url)
                    .with_context(|| format!("failed to set origin of {}", repo.display()))?;
            }
        } else if let Some(url) = remote.as_deref().filter(|_| is_empty_dir(repo)) {
            git.clone_into(url, repo)
                .with_context(|| format!("failed to clone {url}"))?;
            println!("{} cloned {url} into {}", "✓".green(), repo.display());
        } else {
            git.init(repo)
                .with_context(|| format!("failed to initialize {}", repo.display()))?;
            if let Some(url) = &remote {
                git.set_remote(repo, url)
                    .with_context(|| format!("failed to set origin of {}", repo.display()))?;
            }
            println!("{} initialized {}", "✓".green(), repo.display());
        }

        if !config::manifest_path(repo).exists() {
            ws.save_manifest(&Manifest::default())?;
            git.commit(repo, "Initialize mirra manifest")
                .context("failed to commit the manifest")?;
            if remote.is_some() {
                git.push(repo).context("failed to push the manifest")?;
            }
            println!(
                "{} created {}",
                "✓".green(),
                config::manifest_path(repo).display()
            );
        }

        let mut settings = ws.settings.clone();
        settings.remote_url = remote;
        config::save_settings_at(&ws.config_dir, &settings)
            .with_context(|| format!("failed to save settings in {}", ws.config_dir.display()))?;
        println!(
            "{} saved {}",
            "✓".green(),
            config::settings_path(&ws.config_dir).display()
        );

        if !self.no_service {
            let installer = installer_for(&ws.platform, service_spec(&ws.config_dir)?);
            match installer.install() {
                Ok(path) => println!(
                    "{} installed {} service: {}",
                    "✓".green(),
                    installer.manager(),
                    path.display()
                ),
                Err(err) => eprintln!("{} {err}", "warning: could not install service:".yellow()),
            }
        }

        if settings.remote_url.is_none() {
            println!(
                "{} no remote configured; rerun with --remote <url> to share",
                "!".yellow()
            );
        }
        println!("\nSetup complete. Run `mirra add <file>` to start.");
        Ok(())
    }

    /// Find or create `<user>/<repo_name>` with `gh`; `None` without `gh`.
    fn hosted_remote(&self) -> Result<Option<String>> {
        let gh = GhCli::new();
        if !gh.is_installed() {
            println!("{} gh not found; using a local repository", "!".yellow());
            return Ok(None);
        }
        gh.check_auth().context("gh is not authenticated")?;
        let user = gh.detect_user(self.user.as_deref())?;
        println!("{} GitHub user: {user}", "✓".green());

        if gh.repo_exists(&user, &self.repo_name) {
            println!("{} {user}/{} exists", "✓".green(), self.repo_name);
        } else {
            gh.create_private_repo(&self.repo_name)?;
            println!(
                "{} created private repository {user}/{}",
                "✓".green(),
                self.repo_name
            );
        }
        let url = gh.clone_url(&user, &self.repo_name)?;
        if url.is_empty() {
            bail!("gh returned no clone URL for {user}/{}", self.repo_name);
        }
        Ok(Some(url))
    }
}

fn is_empty_dir(path: &Path) -> bool {
    match fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}
