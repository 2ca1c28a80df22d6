//! Auto-start units for the user's service manager.
//!
//! The installer is picked at runtime from [`Platform`]; every variant runs
//! `<binary> daemon start --foreground --config-dir <dir>` and leaves
//! backgrounding to the supervisor.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use mirra_core::types::Platform;

use crate::error::{io_err, DaemonError};
use crate::paths::{
    launch_agents_dir, launchd_plist_path, logs_dir, stderr_log_path, stdout_log_path,
    systemd_unit_path, systemd_user_dir, DAEMON_LABEL, SYSTEMD_UNIT,
};

/// What an auto-start unit needs to know.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub binary: PathBuf,
    pub config_dir: PathBuf,
    pub home: PathBuf,
}

impl ServiceSpec {
    fn program_arguments(&self) -> Vec<String> {
        vec![
            self.binary.display().to_string(),
            "daemon".to_string(),
            "start".to_string(),
            "--foreground".to_string(),
            "--config-dir".to_string(),
            self.config_dir.display().to_string(),
        ]
    }
}

pub trait ServiceInstaller {
    /// Service manager name, for messages.
    fn manager(&self) -> &str;

    /// Write the unit and register it. Returns the unit file path.
    fn install(&self) -> Result<PathBuf, DaemonError>;

    /// Deregister and delete the unit. Missing units are not an error.
    fn uninstall(&self) -> Result<(), DaemonError>;
}

pub fn installer_for(platform: &Platform, spec: ServiceSpec) -> Box<dyn ServiceInstaller> {
    match platform {
        Platform::Darwin => Box::new(Launchd { spec }),
        Platform::Linux => Box::new(Systemd { spec }),
        other => Box::new(Unsupported {
            platform: other.clone(),
        }),
    }
}

// ---------------------------------------------------------------------------
// 1. launchd
// ---------------------------------------------------------------------------

pub struct Launchd {
    spec: ServiceSpec,
}

/// Generate a launchd plist for the mirra daemon.
pub fn generate_plist(spec: &ServiceSpec) -> String {
    let args = spec
        .program_arguments()
        .iter()
        .map(|arg| format!("    <string>{}</string>", xml_escape(arg)))
        .collect::<Vec<_>>()
        .join("\n");
    let stdout = xml_escape(&stdout_log_path(&spec.config_dir).display().to_string());
    let stderr = xml_escape(&stderr_log_path(&spec.config_dir).display().to_string());

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>{label}</string>
  <key>ProgramArguments</key>
  <array>
{args}
  </array>
  <key>RunAtLoad</key>
  <true/>
  <key>KeepAlive</key>
  <true/>
  <key>StandardOutPath</key>
  <string>{stdout}</string>
  <key>StandardErrorPath</key>
  <string>{stderr}</string>
</dict>
</plist>
"#,
        label = DAEMON_LABEL,
    )
}

impl ServiceInstaller for Launchd {
    fn manager(&self) -> &str {
        "launchd"
    }

    fn install(&self) -> Result<PathBuf, DaemonError> {
        let agents = launch_agents_dir(&self.spec.home);
        fs::create_dir_all(&agents).map_err(|e| io_err(&agents, e))?;
        let logs = logs_dir(&self.spec.config_dir);
        fs::create_dir_all(&logs).map_err(|e| io_err(&logs, e))?;

        let plist = launchd_plist_path(&self.spec.home);
        fs::write(&plist, generate_plist(&self.spec)).map_err(|e| io_err(&plist, e))?;

        let domain = launchctl_domain()?;
        let service = format!("{domain}/{DAEMON_LABEL}");
        let plist_arg = plist.display().to_string();

        let _ = run_tool("launchctl", &["bootout", &service], true);
        run_tool("launchctl", &["bootstrap", &domain, &plist_arg], false)?;
        run_tool("launchctl", &["kickstart", "-k", &service], false)?;
        Ok(plist)
    }

    fn uninstall(&self) -> Result<(), DaemonError> {
        let plist = launchd_plist_path(&self.spec.home);
        if plist.exists() {
            let domain = launchctl_domain()?;
            let service = format!("{domain}/{DAEMON_LABEL}");
            let _ = run_tool("launchctl", &["bootout", &service], true);
            fs::remove_file(&plist).map_err(|e| io_err(&plist, e))?;
        }
        Ok(())
    }
}

fn launchctl_domain() -> Result<String, DaemonError> {
    let output = Command::new("id")
        .arg("-u")
        .output()
        .map_err(|e| io_err("id -u", e))?;
    if !output.status.success() {
        return Err(DaemonError::Service(format!(
            "failed to resolve current uid (status {})",
            output.status
        )));
    }

    let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if uid.is_empty() {
        return Err(DaemonError::Service(
            "current uid from `id -u` was empty".to_string(),
        ));
    }
    Ok(format!("gui/{uid}"))
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ---------------------------------------------------------------------------
// 2. systemd (user instance)
// ---------------------------------------------------------------------------

pub struct Systemd {
    spec: ServiceSpec,
}

/// Generate a systemd user unit for the mirra daemon.
pub fn generate_systemd_unit(spec: &ServiceSpec) -> String {
    let exec = spec
        .program_arguments()
        .iter()
        .map(|arg| systemd_quote(arg))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "[Unit]\n\
         Description=mirra dotfile sync daemon\n\
         After=network-online.target\n\
         \n\
         [Service]\n\
         Type=simple\n\
         ExecStart={exec}\n\
         Restart=on-failure\n\
         RestartSec=10\n\
         \n\
         [Install]\n\
         WantedBy=default.target\n"
    )
}

fn systemd_quote(arg: &str) -> String {
    if arg.chars().any(|c| c.is_whitespace() || c == '"') {
        format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

impl ServiceInstaller for Systemd {
    fn manager(&self) -> &str {
        "systemd"
    }

    fn install(&self) -> Result<PathBuf, DaemonError> {
        let dir = systemd_user_dir(&self.spec.home);
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

        let unit = systemd_unit_path(&self.spec.home);
        fs::write(&unit, generate_systemd_unit(&self.spec)).map_err(|e| io_err(&unit, e))?;

        run_tool("systemctl", &["--user", "daemon-reload"], false)?;
        run_tool("systemctl", &["--user", "enable", "--now", SYSTEMD_UNIT], false)?;
        Ok(unit)
    }

    fn uninstall(&self) -> Result<(), DaemonError> {
        let unit = systemd_unit_path(&self.spec.home);
        if unit.exists() {
            let _ = run_tool("systemctl", &["--user", "disable", "--now", SYSTEMD_UNIT], true);
            fs::remove_file(&unit).map_err(|e| io_err(&unit, e))?;
            let _ = run_tool("systemctl", &["--user", "daemon-reload"], true);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 3. Everything else
// ---------------------------------------------------------------------------

pub struct Unsupported {
    platform: Platform,
}

impl ServiceInstaller for Unsupported {
    fn manager(&self) -> &str {
        "none"
    }

    fn install(&self) -> Result<PathBuf, DaemonError> {
        Err(DaemonError::Service(format!(
            "auto-start is not supported on {}",
            self.platform
        )))
    }

    fn uninstall(&self) -> Result<(), DaemonError> {
        Err(DaemonError::Service(format!(
            "auto-start is not supported on {}",
            self.platform
        )))
    }
}

fn run_tool(program: &str, args: &[&str], ignore_failure: bool) -> Result<(), DaemonError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| io_err(program, e))?;

    if output.status.success() || ignore_failure {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Err(DaemonError::Service(format!(
        "{program} {} failed (status {}): {} {}",
        args.join(" "),
        output.status,
        stdout,
        stderr
    )))
}
