//! Machine driver backed by the `macadam` VM helper binary.
//!
//! `macadam` manages podman-machine style VMs (vfkit on macOS, qemu/libvirt
//! on Linux, Hyper-V on Windows) behind a uniform CLI. This driver shells
//! out to it for every operation and parses its `inspect --format json`
//! output for state and connection details.

use super::{
    Client, ClusterConfig, ClusterLoadResult, ClusterState, ClusterStatusResult,
    ConnectionDetails, ConsoleResult, OpenShiftStatus, Preset, StartConfig, StartResult,
};
use crate::config::MachineDefaults;
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Machine driver shelling out to the `macadam` binary.
pub struct MacadamMachine {
    name: String,
    preset: Preset,
    defaults: MachineDefaults,
    executable: PathBuf,
}

/// Subset of `macadam inspect --format json` output this driver consumes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VmInspectInfo {
    state: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    ssh_config: Option<SshConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SshConfig {
    port: u16,
    #[serde(default)]
    identity_path: Option<String>,
    #[serde(default)]
    remote_username: Option<String>,
}

impl MacadamMachine {
    /// Creates a driver for the machine described by `defaults`.
    #[must_use]
    pub fn new(defaults: MachineDefaults) -> Self {
        Self {
            name: defaults.name.clone(),
            preset: defaults.preset,
            defaults,
            executable: PathBuf::from("macadam"),
        }
    }

    /// Overrides the `macadam` executable path (mainly for tests).
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        tracing::debug!(executable = %self.executable.display(), ?args, "running macadam");
        let output = Command::new(&self.executable)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                CoreError::machine(format!(
                    "failed to run {}: {e}",
                    self.executable.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::machine(format!(
                "macadam {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn inspect(&self) -> Result<VmInspectInfo> {
        let stdout = self.run(&["inspect", &self.name, "--format", "json"]).await?;
        let mut vms: Vec<VmInspectInfo> = serde_json::from_str(&stdout)
            .map_err(|e| CoreError::machine(format!("cannot parse inspect output: {e}")))?;
        if vms.is_empty() {
            return Err(CoreError::not_found(format!("virtual machine {}", self.name)));
        }
        Ok(vms.remove(0))
    }

    async fn vm_state(&self) -> Result<ClusterState> {
        match self.inspect().await {
            Ok(info) => Ok(parse_state(&info.state)),
            Err(CoreError::Common(err)) if err.is_not_found() => Ok(ClusterState::NoVm),
            Err(err) => Err(err),
        }
    }

    async fn init(&self, config: &StartConfig) -> Result<()> {
        let bundle = config
            .bundle_path
            .clone()
            .or_else(|| self.defaults.bundle_path.clone())
            .ok_or_else(|| {
                CoreError::config("no bundle configured; set machine.bundle_path")
            })?;

        let memory = config.memory_mib.to_string();
        let cpus = config.cpus.to_string();
        let disk_size = config.disk_size_gib.to_string();
        let bundle = bundle.display().to_string();

        self.run(&[
            "init",
            "--memory",
            &memory,
            "--cpus",
            &cpus,
            "--disk-size",
            &disk_size,
            "--username",
            shiftbox_constants::SSH_USERNAME,
            "--image",
            &bundle,
            &self.name,
        ])
        .await?;
        Ok(())
    }

    fn cluster_config(&self, kube_config: PathBuf) -> ClusterConfig {
        ClusterConfig {
            cluster_type: self.preset,
            cluster_ca_cert: String::new(),
            kube_config,
            kubeadmin_pass: String::new(),
            cluster_api: shiftbox_constants::cluster_api_url(),
            web_console_url: shiftbox_constants::web_console_url(),
        }
    }
}

#[async_trait]
impl Client for MacadamMachine {
    fn name(&self) -> &str {
        &self.name
    }

    fn preset(&self) -> Preset {
        self.preset
    }

    async fn start(&self, cancel: CancellationToken, config: StartConfig) -> Result<StartResult> {
        if !self.exists().await? {
            tracing::info!(machine = %self.name, "initializing virtual machine");
            self.init(&config).await?;
        }

        tracing::info!(machine = %self.name, "starting virtual machine");
        let mut child = Command::new(&self.executable)
            .args(["start", &self.name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CoreError::machine(format!(
                    "failed to run {}: {e}",
                    self.executable.display()
                ))
            })?;

        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!(machine = %self.name, "start canceled, killing macadam");
                let _ = child.kill().await;
                return Err(CoreError::Canceled);
            }
            status = child.wait() => {
                let status = status.map_err(|e| {
                    CoreError::machine(format!("waiting for macadam start: {e}"))
                })?;
                if !status.success() {
                    return Err(CoreError::machine(format!(
                        "macadam start exited with {status}"
                    )));
                }
            }
        }

        let state = self.vm_state().await?;
        Ok(StartResult {
            status: state,
            cluster_config: self.cluster_config(
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("/root"))
                    .join(".kube")
                    .join("config"),
            ),
            kubelet_started: state == ClusterState::Running
                && self.preset != Preset::Podman,
        })
    }

    async fn stop(&self) -> Result<ClusterState> {
        tracing::info!(machine = %self.name, "stopping virtual machine");
        self.run(&["stop", &self.name]).await?;
        self.vm_state().await
    }

    async fn delete(&self) -> Result<()> {
        tracing::info!(machine = %self.name, "removing virtual machine");
        self.run(&["rm", "--force", &self.name]).await?;
        Ok(())
    }

    async fn power_off(&self) -> Result<()> {
        // `stop --force` skips the guest shutdown and tears the VM process down.
        self.run(&["stop", "--force", &self.name]).await?;
        Ok(())
    }

    async fn status(&self) -> Result<ClusterStatusResult> {
        let state = self.vm_state().await?;
        let mut status = ClusterStatusResult::transitional(state);
        status.ram_size = i64::try_from(self.defaults.memory_mib)
            .unwrap_or(i64::MAX)
            .saturating_mul(1024 * 1024);
        status.disk_size = i64::try_from(self.defaults.disk_size_gib)
            .unwrap_or(i64::MAX)
            .saturating_mul(1024 * 1024 * 1024);
        if self.preset != Preset::Podman {
            status.openshift_status = Some(match state {
                ClusterState::Running => OpenShiftStatus::Running,
                ClusterState::Starting => OpenShiftStatus::Starting,
                ClusterState::Stopping => OpenShiftStatus::Stopping,
                _ => OpenShiftStatus::Stopped,
            });
        }
        Ok(status)
    }

    async fn exists(&self) -> Result<bool> {
        let stdout = self.run(&["list"]).await?;
        Ok(stdout.lines().any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|n| n == self.name || n == format!("{}*", self.name))
        }))
    }

    async fn console_url(&self) -> Result<ConsoleResult> {
        let state = self.vm_state().await?;
        Ok(ConsoleResult {
            cluster_config: self.cluster_config(
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("/root"))
                    .join(".kube")
                    .join("config"),
            ),
            state,
        })
    }

    async fn connection_details(&self) -> Result<ConnectionDetails> {
        let info = self.inspect().await?;
        let ssh = info
            .ssh_config
            .ok_or_else(|| CoreError::machine("inspect output has no SSH config"))?;
        Ok(ConnectionDetails {
            ip: "127.0.0.1".to_string(),
            ssh_port: ssh.port,
            ssh_username: ssh
                .remote_username
                .unwrap_or_else(|| shiftbox_constants::SSH_USERNAME.to_string()),
            ssh_keys: ssh.identity_path.map(PathBuf::from).into_iter().collect(),
        })
    }

    async fn cluster_load(&self) -> Result<ClusterLoadResult> {
        // TODO: sample /proc/meminfo and /proc/stat over SSH once the ssh
        // runner lands; until then only the configured RAM size is reported.
        if !self.is_running().await? {
            return Ok(ClusterLoadResult::default());
        }
        Ok(ClusterLoadResult {
            ram_use: 0,
            ram_size: i64::try_from(self.defaults.memory_mib)
                .unwrap_or(i64::MAX)
                .saturating_mul(1024 * 1024),
            cpu_use: Vec::new(),
        })
    }

    async fn is_running(&self) -> Result<bool> {
        Ok(self.vm_state().await? == ClusterState::Running)
    }

    async fn generate_bundle(&self, force_stop: bool) -> Result<()> {
        if self.is_running().await? {
            if !force_stop {
                return Err(CoreError::machine(
                    "cluster must be stopped before generating a bundle",
                ));
            }
            self.stop().await?;
        }

        let info = self.inspect().await?;
        let image = info
            .image
            .ok_or_else(|| CoreError::machine("inspect output has no disk image path"))?;
        tracing::info!(machine = %self.name, image, "disk image ready for bundling");
        Ok(())
    }
}

/// Maps a macadam state string to a [`ClusterState`].
fn parse_state(raw: &str) -> ClusterState {
    let raw = raw.trim().to_lowercase();
    if raw.contains("running") {
        ClusterState::Running
    } else if raw.contains("stopped") || raw.contains("shutoff") {
        ClusterState::Stopped
    } else if raw.contains("stopping") {
        ClusterState::Stopping
    } else if raw.contains("starting") {
        ClusterState::Starting
    } else {
        ClusterState::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_state() {
        assert_eq!(parse_state("Running"), ClusterState::Running);
        assert_eq!(parse_state(" stopped\n"), ClusterState::Stopped);
        assert_eq!(parse_state("Shutoff"), ClusterState::Stopped);
        assert_eq!(parse_state("stopping"), ClusterState::Stopping);
        assert_eq!(parse_state("starting"), ClusterState::Starting);
        assert_eq!(parse_state("zombie"), ClusterState::Error);
    }

    #[test]
    fn test_inspect_parsing() {
        let raw = r#"[{"State":"running","Image":"/var/lib/shiftbox/disk.img",
            "SshConfig":{"Port":49213,"IdentityPath":"/home/core/.ssh/id","RemoteUsername":"core"}}]"#;
        let vms: Vec<VmInspectInfo> = serde_json::from_str(raw).unwrap();
        assert_eq!(vms[0].state, "running");
        let ssh = vms[0].ssh_config.as_ref().unwrap();
        assert_eq!(ssh.port, 49213);
        assert_eq!(ssh.remote_username.as_deref(), Some("core"));
    }
}
