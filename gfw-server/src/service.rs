//! systemd unit installation for `--install-service`.

use std::env;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, bail};
use tokio::process::Command;
use tracing::{info, warn};

pub const UNIT_NAME: &str = "gfw.service";
pub const UNIT_TARGET: &str = "/etc/systemd/system/gfw.service";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUnit {
    pub exec_start: PathBuf,
    pub working_directory: PathBuf,
    pub user: String,
}

impl ServiceUnit {
    /// Describe the running binary as a service of the current user, rooted at
    /// the current working directory.
    pub fn for_current_process() -> anyhow::Result<Self> {
        let exec_start =
            env::current_exe().context("failed to resolve the gfw executable path")?;
        let working_directory =
            env::current_dir().context("failed to resolve the working directory")?;
        let user = env::var("USER")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .context("failed to determine the current user ($USER is not set)")?;

        Ok(Self {
            exec_start,
            working_directory,
            user,
        })
    }

    pub fn render(&self) -> String {
        format!(
            "[Unit]\n\
             Description=GFW Service\n\
             After=network.target\n\
             \n\
             [Service]\n\
             Type=simple\n\
             ExecStart={}\n\
             WorkingDirectory={}\n\
             Restart=on-failure\n\
             User={}\n\
             \n\
             [Install]\n\
             WantedBy=multi-user.target\n",
            self.exec_start.display(),
            self.working_directory.display(),
            self.user
        )
    }
}

/// Write the unit next to the working directory, copy it into place with
/// `sudo`, then reload systemd and enable the service.
pub async fn install(unit: &ServiceUnit) -> anyhow::Result<()> {
    let staging = unit.working_directory.join(UNIT_NAME);
    tokio::fs::write(&staging, unit.render())
        .await
        .with_context(|| format!("failed to write {}", staging.display()))?;

    let staged = staging.to_string_lossy().into_owned();
    let copied = run("sudo", &["cp", staged.as_str(), UNIT_TARGET]).await;
    if let Err(err) = tokio::fs::remove_file(&staging).await {
        warn!(path = %staging.display(), error = %err, "failed to remove staged unit file");
    }
    copied.with_context(|| format!("failed to install {UNIT_TARGET}"))?;

    // Reload and enable failures are logged, not fatal.
    for args in [
        &["systemctl", "daemon-reload"][..],
        &["systemctl", "enable", "--now", UNIT_NAME][..],
    ] {
        if let Err(err) = run("sudo", args).await {
            warn!(command = %args.join(" "), error = %err, "systemctl step failed");
        }
    }

    info!(unit = UNIT_TARGET, "systemd service installed and started");
    Ok(())
}

async fn run(program: &str, args: &[&str]) -> anyhow::Result<()> {
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .status()
        .await
        .with_context(|| format!("failed to spawn {program}"))?;
    if !status.success() {
        bail!("{program} {} exited with {status}", args.join(" "));
    }
    Ok(())
}
