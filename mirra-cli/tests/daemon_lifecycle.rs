#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn mirra_cmd(home: &Path, config: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mirra"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .arg("--config-dir")
        .arg(config);
    cmd
}

struct DaemonProcess {
    child: Child,
    home: PathBuf,
    config: PathBuf,
}

impl DaemonProcess {
    fn start(home: &Path, config: &Path) -> Self {
        let child = mirra_cmd(home, config)
            .args(["daemon", "start", "--foreground"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");
        Self {
            child,
            home: home.to_path_buf(),
            config: config.to_path_buf(),
        }
    }

    fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        wait_until(timeout, || matches!(self.child.try_wait(), Ok(Some(_))))
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            return;
        }
        let _ = mirra_cmd(&self.home, &self.config)
            .args(["daemon", "stop"])
            .status();
        if !self.wait_for_exit(Duration::from_secs(2)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn daemon_running(home: &Path, config: &Path) -> bool {
    let Ok(output) = mirra_cmd(home, config)
        .args(["daemon", "status", "--json"])
        .output()
    else {
        return false;
    };
    if !output.status.success() {
        return false;
    }
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(&output.stdout) else {
        return false;
    };
    value
        .get("running")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(100));
    }
    false
}

#[test]
fn status_when_never_started() {
    let home = TempDir::new().expect("home");
    let config = home.path().join("config");

    mirra_cmd(home.path(), &config)
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains("daemon is not running"));

    mirra_cmd(home.path(), &config)
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon is not running"));
}

#[test]
fn stale_pid_file_is_cleared_by_status() {
    let home = TempDir::new().expect("home");
    let config = home.path().join("config");
    std::fs::create_dir_all(&config).expect("mkdir config");
    let pid_file = config.join("daemon.pid");
    std::fs::write(&pid_file, format!("{}\n", i32::MAX)).expect("write pid");

    mirra_cmd(home.path(), &config)
        .args(["daemon", "status", "--json"])
        .assert()
        .success()
        .stdout(contains("\"running\": false"));
    assert!(!pid_file.exists(), "stale pid file should be removed");
}

#[test]
fn foreground_daemon_starts_refuses_duplicates_and_stops() {
    let home = TempDir::new().expect("home");
    let config = home.path().join("config");

    let mut daemon = DaemonProcess::start(home.path(), &config);
    assert!(
        wait_until(Duration::from_secs(10), || daemon_running(
            home.path(),
            &config
        )),
        "daemon did not report running state in time",
    );

    mirra_cmd(home.path(), &config)
        .args(["daemon", "start", "--foreground"])
        .assert()
        .failure()
        .stderr(contains("already running"));

    mirra_cmd(home.path(), &config)
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon stop requested"));

    assert!(
        daemon.wait_for_exit(Duration::from_secs(10)),
        "daemon did not exit after SIGTERM"
    );
    assert!(!config.join("daemon.pid").exists());
    assert!(!daemon_running(home.path(), &config));
}

#[test]
fn logs_without_files_reports_missing() {
    let home = TempDir::new().expect("home");
    let config = home.path().join("config");

    mirra_cmd(home.path(), &config)
        .args(["daemon", "logs", "--stderr-only"])
        .assert()
        .success()
        .stdout(contains("log file not found"));
}
