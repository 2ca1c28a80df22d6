use std::path::{Path, PathBuf};
use std::time::Duration;

pub use mirra_core::config::{logs_dir, pid_path};

pub const DAEMON_LABEL: &str = "dev.mirra.daemon";
pub const SYSTEMD_UNIT: &str = "mirra.service";
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(2);
pub const AUTO_SYNC_MESSAGE: &str = "Auto-sync: file changed";

pub const DAEMON_STDOUT_LOG: &str = "daemon.log";
pub const DAEMON_STDERR_LOG: &str = "daemon-err.log";

pub fn stdout_log_path(config_dir: &Path) -> PathBuf {
    logs_dir(config_dir).join(DAEMON_STDOUT_LOG)
}

pub fn stderr_log_path(config_dir: &Path) -> PathBuf {
    logs_dir(config_dir).join(DAEMON_STDERR_LOG)
}

pub fn launch_agents_dir(home: &Path) -> PathBuf {
    home.join("Library").join("LaunchAgents")
}

pub fn launchd_plist_path(home: &Path) -> PathBuf {
    launch_agents_dir(home).join(format!("{DAEMON_LABEL}.plist"))
}

pub fn systemd_user_dir(home: &Path) -> PathBuf {
    home.join(".config").join("systemd").join("user")
}

pub fn systemd_unit_path(home: &Path) -> PathBuf {
    systemd_user_dir(home).join(SYSTEMD_UNIT)
}
