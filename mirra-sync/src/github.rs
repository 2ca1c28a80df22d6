//! Hosted-repository collaborator backed by the `gh` command line.
//!
//! Only `mirra setup` uses it, and only when `gh` is installed.

use std::path::PathBuf;
use std::process::{Command, Output};

use serde::Deserialize;

use crate::error::SyncError;

/// Repository created by `mirra setup` when no remote is given.
pub const DEFAULT_REPO_NAME: &str = "mirra-dotfiles";

#[derive(Debug, Clone)]
pub struct GhCli {
    program: PathBuf,
}

impl Default for GhCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gh"),
        }
    }
}

#[derive(Deserialize)]
struct RepoView {
    #[serde(rename = "sshUrl")]
    ssh_url: String,
}

impl GhCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the binary can be run at all.
    pub fn is_installed(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .is_ok_and(|output| output.status.success())
    }

    pub fn check_auth(&self) -> Result<(), SyncError> {
        self.run_ok(&["auth", "status"]).map(|_| ())
    }

    /// `explicit`, else the authenticated login, else `git config user.name`.
    pub fn detect_user(&self, explicit: Option<&str>) -> Result<String, SyncError> {
        if let Some(user) = explicit.map(str::trim).filter(|u| !u.is_empty()) {
            return Ok(user.to_string());
        }
        if let Ok(login) = self.run_ok(&["api", "user", "--jq", ".login"]) {
            if !login.is_empty() {
                return Ok(login);
            }
        }
        let fallback = Command::new("git")
            .args(["config", "user.name"])
            .output()
            .ok()
            .filter(|output| output.status.success())
            .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
            .filter(|name| !name.is_empty());
        fallback.ok_or_else(|| SyncError::Hosting {
            command: "api user".to_string(),
            output: "could not detect the GitHub user; pass --user".to_string(),
        })
    }

    pub fn repo_exists(&self, user: &str, repo: &str) -> bool {
        self.run_ok(&["repo", "view", &format!("{user}/{repo}"), "--json", "name"])
            .is_ok()
    }

    pub fn create_private_repo(&self, repo: &str) -> Result<(), SyncError> {
        self.run_ok(&[
            "repo",
            "create",
            repo,
            "--private",
            "--description",
            "mirra dotfiles",
        ])?;
        tracing::info!("created private repository {}", repo);
        Ok(())
    }

    /// SSH clone URL of `user/repo`.
    pub fn clone_url(&self, user: &str, repo: &str) -> Result<String, SyncError> {
        let json = self.run_ok(&["repo", "view", &format!("{user}/{repo}"), "--json", "sshUrl"])?;
        parse_ssh_url(&json).map_err(|err| SyncError::Hosting {
            command: "repo view".to_string(),
            output: err.to_string(),
        })
    }

    fn run_ok(&self, args: &[&str]) -> Result<String, SyncError> {
        let output: Output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| crate::error::io_err(&self.program, e))?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            Ok(stdout)
        } else {
            Err(SyncError::Hosting {
                command: args.join(" "),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

fn parse_ssh_url(json: &str) -> Result<String, serde_json::Error> {
    serde_json::from_str::<RepoView>(json).map(|view| view.ssh_url)
}
