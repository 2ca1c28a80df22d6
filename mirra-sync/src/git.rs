//! Version-control collaborator.
//!
//! The daemon and the CLI only see [`VersionControl`]; [`GitCli`] shells out
//! to the `git` binary. Every call blocks until the subprocess exits.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::SyncError;

/// Moves canonical content between this machine and the remote.
pub trait VersionControl: Send + Sync {
    /// Fetch and integrate remote commits. Returns `true` when new content
    /// arrived.
    fn pull(&self, repo: &Path) -> Result<bool, SyncError>;

    /// Stage everything, commit with `message` and push. Returns `false`
    /// when there was nothing to commit (no push is attempted then).
    fn commit_and_push(&self, repo: &Path, message: &str) -> Result<bool, SyncError>;

    /// Whether the working tree has uncommitted changes.
    fn has_changes(&self, repo: &Path) -> Result<bool, SyncError>;
}

/// [`VersionControl`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `git` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `git init` unless `repo` already holds a repository.
    pub fn init(&self, repo: &Path) -> Result<bool, SyncError> {
        if repo.join(".git").exists() {
            return Ok(false);
        }
        std::fs::create_dir_all(repo).map_err(|e| crate::error::io_err(repo, e))?;
        self.run_ok(repo, &["init", "-q"])?;
        tracing::info!("initialized git repository in {}", repo.display());
        Ok(true)
    }

    /// `git clone <url> <dest>`, creating the parent of `dest` first.
    pub fn clone_into(&self, url: &str, dest: &Path) -> Result<(), SyncError> {
        let parent = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| crate::error::io_err(parent, e))?;
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        self.run_ok(parent, &["clone", "-q", url, &name])?;
        tracing::info!("cloned {} into {}", url, dest.display());
        Ok(())
    }

    /// Point `origin` at `url`, adding the remote if it does not exist.
    pub fn set_remote(&self, repo: &Path, url: &str) -> Result<(), SyncError> {
        if self.run(repo, &["remote", "get-url", "origin"])?.status.success() {
            self.run_ok(repo, &["remote", "set-url", "origin", url])?;
        } else {
            self.run_ok(repo, &["remote", "add", "origin", url])?;
        }
        Ok(())
    }

    /// Stage everything and commit. `false` when there was nothing to commit.
    pub fn commit(&self, repo: &Path, message: &str) -> Result<bool, SyncError> {
        self.run_ok(repo, &["add", "-A"])?;

        let output = self.run(repo, &["commit", "-m", message])?;
        if output.status.success() {
            return Ok(true);
        }
        let text = combined(&output);
        if nothing_to_commit(&text) {
            tracing::debug!("nothing to commit in {}", repo.display());
            return Ok(false);
        }
        Err(SyncError::Git {
            command: "commit".to_string(),
            output: text,
        })
    }

    /// Push the current branch; the first push of a fresh clone or a newly
    /// added remote also sets its upstream.
    pub fn push(&self, repo: &Path) -> Result<(), SyncError> {
        let upstream = self.run(
            repo,
            &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
        )?;
        if upstream.status.success() {
            self.run_ok(repo, &["push"])?;
        } else {
            self.run_ok(repo, &["push", "-u", "origin", "HEAD"])?;
        }
        Ok(())
    }

    fn run(&self, repo: &Path, args: &[&str]) -> Result<Output, SyncError> {
        Command::new(&self.program)
            .arg("-C")
            .arg(repo)
            .args(args)
            // Output is matched against English messages.
            .env("LC_ALL", "C")
            .output()
            .map_err(|source| SyncError::GitSpawn {
                command: args.join(" "),
                source,
            })
    }

    fn run_ok(&self, repo: &Path, args: &[&str]) -> Result<String, SyncError> {
        let output = self.run(repo, args)?;
        let text = combined(&output);
        if output.status.success() {
            Ok(text)
        } else {
            Err(SyncError::Git {
                command: args.join(" "),
                output: text,
            })
        }
    }
}

impl VersionControl for GitCli {
    fn pull(&self, repo: &Path) -> Result<bool, SyncError> {
        let text = self.run_ok(repo, &["pull", "--rebase", "--autostash"])?;
        let changed = !is_up_to_date(&text);
        tracing::debug!("git pull in {} (changed: {})", repo.display(), changed);
        Ok(changed)
    }

    fn commit_and_push(&self, repo: &Path, message: &str) -> Result<bool, SyncError> {
        if !self.commit(repo, message)? {
            return Ok(false);
        }
        self.push(repo)?;
        tracing::info!("pushed {:?} from {}", message, repo.display());
        Ok(true)
    }

    fn has_changes(&self, repo: &Path) -> Result<bool, SyncError> {
        let text = self.run_ok(repo, &["status", "--porcelain"])?;
        Ok(!text.is_empty())
    }
}

fn combined(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text.trim().to_string()
}

fn is_up_to_date(text: &str) -> bool {
    text.contains("Already up to date") || text.contains("is up to date")
}

fn nothing_to_commit(text: &str) -> bool {
    text.contains("nothing to commit") || text.contains("nothing added to commit")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .status()
            .expect("spawn git");
        assert!(status.success(), "git {args:?} failed in {}", dir.display());
    }

    fn identify(dir: &Path) {
        git(dir, &["config", "user.email", "tester@example.com"]);
        git(dir, &["config", "user.name", "Tester"]);
    }

    /// A bare remote with one commit and two clones tracking it.
    fn clones() -> (TempDir, PathBuf, PathBuf) {
        let root = TempDir::new().expect("tempdir");
        let seed = root.path().join("seed");
        fs::create_dir_all(&seed).expect("mkdir seed");
        git(&seed, &["init", "-q"]);
        identify(&seed);
        fs::write(seed.join("mirra.yaml"), "files: []\n").expect("write seed");
        git(&seed, &["add", "-A"]);
        git(&seed, &["commit", "-q", "-m", "seed"]);

        let remote = root.path().join("remote.git");
        git(
            root.path(),
            &["clone", "-q", "--bare", "seed", "remote.git"],
        );
        assert!(remote.exists());

        let a = root.path().join("a");
        let b = root.path().join("b");
        git(root.path(), &["clone", "-q", "remote.git", "a"]);
        git(root.path(), &["clone", "-q", "remote.git", "b"]);
        identify(&a);
        identify(&b);
        (root, a, b)
    }

    #[test]
    fn commit_push_then_pull_reports_change() {
        if !git_available() {
            eprintln!("git not available; skipping");
            return;
        }
        let (_root, a, b) = clones();
        let vcs = GitCli::new();

        fs::write(a.join("vimrc"), "set number\n").expect("write");
        assert!(vcs.has_changes(&a).expect("status"));
        assert!(vcs
            .commit_and_push(&a, "Auto-sync: file changed")
            .expect("push"));
        assert!(!vcs.has_changes(&a).expect("status"));

        assert!(vcs.pull(&b).expect("pull"));
        assert_eq!(
            fs::read_to_string(b.join("vimrc")).expect("read"),
            "set number\n"
        );
        assert!(!vcs.pull(&b).expect("second pull"), "nothing new the second time");
    }

    #[test]
    fn clean_tree_commits_nothing() {
        if !git_available() {
            eprintln!("git not available; skipping");
            return;
        }
        let (_root, a, _b) = clones();
        let pushed = GitCli::new()
            .commit_and_push(&a, "Auto-sync: file changed")
            .expect("commit");
        assert!(!pushed);
    }

    #[test]
    fn init_is_idempotent() {
        if !git_available() {
            eprintln!("git not available; skipping");
            return;
        }
        let root = TempDir::new().expect("tempdir");
        let repo = root.path().join("repo");
        let vcs = GitCli::new();
        assert!(vcs.init(&repo).expect("init"));
        assert!(!vcs.init(&repo).expect("second init"));
    }

    #[test]
    fn first_push_to_empty_remote_sets_upstream() {
        if !git_available() {
            eprintln!("git not available; skipping");
            return;
        }
        let root = TempDir::new().expect("tempdir");
        git(root.path(), &["init", "-q", "--bare", "empty.git"]);
        let remote = root.path().join("empty.git");
        let vcs = GitCli::new();

        let cloned = root.path().join("nested").join("cloned");
        vcs.clone_into(&remote.to_string_lossy(), &cloned)
            .expect("clone empty remote");
        identify(&cloned);
        fs::write(cloned.join("mirra.yaml"), "files: []\n").expect("write");
        assert!(vcs.commit_and_push(&cloned, "Initialize").expect("first push"));

        fs::write(cloned.join("vimrc"), "set number\n").expect("write");
        assert!(vcs.commit_and_push(&cloned, "Add vimrc").expect("second push"));

        git(root.path(), &["clone", "-q", "empty.git", "check"]);
        assert!(root.path().join("check").join("vimrc").exists());
    }

    #[test]
    fn set_remote_adds_then_updates_origin() {
        if !git_available() {
            eprintln!("git not available; skipping");
            return;
        }
        let root = TempDir::new().expect("tempdir");
        git(root.path(), &["init", "-q", "--bare", "remote.git"]);
        let repo = root.path().join("repo");
        let vcs = GitCli::new();
        vcs.init(&repo).expect("init");
        identify(&repo);

        vcs.set_remote(&repo, "/nowhere.git").expect("add origin");
        let remote = root.path().join("remote.git");
        vcs.set_remote(&repo, &remote.to_string_lossy())
            .expect("update origin");

        fs::write(repo.join("mirra.yaml"), "files: []\n").expect("write");
        assert!(vcs.commit_and_push(&repo, "Initialize").expect("push"));
        assert!(!vcs.commit(&repo, "again").expect("clean tree"));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let root = TempDir::new().expect("tempdir");
        let vcs = GitCli::with_program(root.path().join("no-such-git"));
        let err = vcs.has_changes(root.path()).unwrap_err();
        assert!(matches!(err, SyncError::GitSpawn { .. }), "got: {err}");
    }

    #[test]
    fn up_to_date_detection() {
        assert!(is_up_to_date("Already up to date."));
        assert!(is_up_to_date("Current branch main is up to date."));
        assert!(!is_up_to_date("Updating 1a2b3c..4d5e6f\nFast-forward"));
    }
}
