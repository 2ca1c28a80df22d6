#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use mirra_core::{
    config,
    types::{Entry, Manifest, Platform},
};

struct Sandbox {
    _dir: TempDir,
    home: PathBuf,
    config: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let home = dir.path().join("home");
        let config = home.join(".config").join("mirra");
        fs::create_dir_all(&home).expect("mkdir home");
        Self {
            _dir: dir,
            home,
            config,
        }
    }

    fn repo(&self) -> PathBuf {
        self.config.join("repo")
    }

    fn mirra(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mirra"));
        cmd.env("HOME", &self.home)
            .env("USERPROFILE", &self.home)
            .env_remove("RUST_LOG")
            .arg("--config-dir")
            .arg(&self.config);
        cmd
    }

    fn seed_manifest(&self, entries: Vec<Entry>) {
        config::save_manifest_at(&self.repo(), &Manifest { files: entries }).expect("save manifest");
    }
}

fn is_link(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

fn list_json(sandbox: &Sandbox) -> serde_json::Value {
    let output = sandbox
        .mirra()
        .args(["list", "--json"])
        .output()
        .expect("run list");
    assert!(output.status.success(), "list failed: {output:?}");
    serde_json::from_slice(&output.stdout).expect("list JSON")
}

#[test]
fn list_on_fresh_config_reports_nothing_tracked() {
    let sandbox = Sandbox::new();
    sandbox
        .mirra()
        .arg("list")
        .assert()
        .success()
        .stdout(contains("No files tracked"));
}

#[test]
fn add_moves_file_into_repo_and_links_it() {
    let sandbox = Sandbox::new();
    let vimrc = sandbox.home.join(".vimrc");
    fs::write(&vimrc, "set number\n").expect("write vimrc");

    sandbox
        .mirra()
        .args(["add", "--no-push"])
        .arg(&vimrc)
        .assert()
        .success()
        .stdout(contains("tracking vimrc"));

    let canonical = sandbox.repo().join("vimrc");
    assert!(is_link(&vimrc), "original path should now be a link");
    assert_eq!(fs::read_link(&vimrc).expect("read_link"), canonical);
    assert_eq!(fs::read_to_string(&canonical).expect("read"), "set number\n");

    let manifest = fs::read_to_string(sandbox.repo().join("mirra.yaml")).expect("manifest");
    assert!(manifest.contains("~/.vimrc"), "target stored home-relative: {manifest}");

    let listed = list_json(&sandbox);
    assert_eq!(listed[0]["name"], "vimrc");
    assert_eq!(listed[0]["status"], "synced");
    assert_eq!(listed[0]["target"], "~/.vimrc");
}

#[test]
fn remove_restores_a_regular_file() {
    let sandbox = Sandbox::new();
    let zshrc = sandbox.home.join(".zshrc");
    fs::write(&zshrc, "export EDITOR=vim\n").expect("write zshrc");
    sandbox
        .mirra()
        .args(["add", "--no-push"])
        .arg(&zshrc)
        .assert()
        .success();

    sandbox
        .mirra()
        .args(["remove", "zshrc", "--no-push"])
        .assert()
        .success()
        .stdout(contains("no longer tracking zshrc"));

    assert!(!is_link(&zshrc));
    assert_eq!(fs::read_to_string(&zshrc).expect("read"), "export EDITOR=vim\n");
    assert!(!sandbox.repo().join("zshrc").exists());
    assert_eq!(list_json(&sandbox), serde_json::json!([]));
}

#[test]
fn remove_unknown_entry_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .mirra()
        .args(["remove", "nope", "--no-push"])
        .assert()
        .failure()
        .stderr(contains("no entry named 'nope'"));
}

#[test]
fn sync_backs_up_conflicting_file_then_is_idempotent() {
    let sandbox = Sandbox::new();
    sandbox.seed_manifest(vec![
        Entry::new("vimrc", "vimrc").with_target(&Platform::current(), "~/.vimrc")
    ]);
    fs::write(sandbox.repo().join("vimrc"), "canonical\n").expect("write canonical");
    fs::write(sandbox.home.join(".vimrc"), "old\n").expect("write local");

    sandbox
        .mirra()
        .args(["sync", "--offline"])
        .assert()
        .success()
        .stdout(contains("backed up"));

    assert!(is_link(&sandbox.home.join(".vimrc")));
    let backups: Vec<_> = fs::read_dir(&sandbox.home)
        .expect("read home")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".vimrc.conflict-"))
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(fs::read_to_string(backups[0].path()).expect("read backup"), "old\n");

    sandbox
        .mirra()
        .args(["sync", "--offline"])
        .assert()
        .success()
        .stdout(contains("already correct"));
}

#[test]
fn sync_reports_failed_entries_and_still_links_the_rest() {
    let sandbox = Sandbox::new();
    let platform = Platform::current();
    sandbox.seed_manifest(vec![
        Entry::new("broken", "vimrc").with_target(&platform, "~/blocker/nested/vimrc"),
        Entry::new("vimrc", "vimrc").with_target(&platform, "~/.vimrc"),
    ]);
    fs::write(sandbox.repo().join("vimrc"), "canonical\n").expect("write canonical");
    fs::write(sandbox.home.join("blocker"), "a file, not a directory").expect("write blocker");

    sandbox
        .mirra()
        .args(["sync", "--offline"])
        .assert()
        .failure()
        .stderr(contains("1 of 2 entries failed"));

    assert!(is_link(&sandbox.home.join(".vimrc")));
}

#[test]
fn sync_without_repository_skips_git() {
    let sandbox = Sandbox::new();
    sandbox.seed_manifest(vec![
        Entry::new("vimrc", "vimrc").with_target(&Platform::current(), "~/.vimrc")
    ]);
    fs::write(sandbox.repo().join("vimrc"), "canonical\n").expect("write canonical");

    sandbox
        .mirra()
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("is not a git repository"))
        .stdout(contains("created"));
}
