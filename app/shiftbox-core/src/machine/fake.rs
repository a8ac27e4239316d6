//! Canned machine client for tests and the daemon's `--driver fake` mode.

use super::{
    Client, ClusterConfig, ClusterLoadResult, ClusterState, ClusterStatusResult,
    ConnectionDetails, ConsoleResult, OpenShiftStatus, Preset, StartConfig, StartResult,
};
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Machine client returning canned values.
///
/// With `failing` set every operation returns an error, which exercises the
/// error-broadcast paths of the controller and the API.
pub struct FakeMachine {
    failing: bool,
}

impl FakeMachine {
    /// Creates a fake machine whose operations succeed.
    #[must_use]
    pub const fn new() -> Self {
        Self { failing: false }
    }

    /// Creates a fake machine whose operations fail.
    #[must_use]
    pub const fn failing() -> Self {
        Self { failing: true }
    }

    fn dummy_cluster_config() -> ClusterConfig {
        ClusterConfig {
            cluster_type: Preset::OpenShift,
            cluster_ca_cert: "MIIDODCCAiCgAwIBAgIIRVfCKNUa1wIwDQYJ".to_string(),
            kube_config: PathBuf::from("/tmp/kubeconfig"),
            kubeadmin_pass: "foobar".to_string(),
            cluster_api: "https://api.foo.testing:6443".to_string(),
            web_console_url: "https://console.foo.testing:6443".to_string(),
        }
    }
}

impl Default for FakeMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Client for FakeMachine {
    fn name(&self) -> &str {
        "shiftbox"
    }

    fn preset(&self) -> Preset {
        Preset::OpenShift
    }

    async fn start(
        &self,
        _cancel: CancellationToken,
        _config: StartConfig,
    ) -> Result<StartResult> {
        if self.failing {
            return Err(CoreError::machine("failed to start"));
        }
        Ok(StartResult {
            status: ClusterState::Running,
            cluster_config: Self::dummy_cluster_config(),
            kubelet_started: true,
        })
    }

    async fn stop(&self) -> Result<ClusterState> {
        if self.failing {
            return Err(CoreError::machine("stop failed"));
        }
        Ok(ClusterState::Stopped)
    }

    async fn delete(&self) -> Result<()> {
        if self.failing {
            return Err(CoreError::machine("delete failed"));
        }
        Ok(())
    }

    async fn power_off(&self) -> Result<()> {
        if self.failing {
            return Err(CoreError::machine("poweroff failed"));
        }
        Ok(())
    }

    async fn status(&self) -> Result<ClusterStatusResult> {
        if self.failing {
            return Err(CoreError::machine("broken"));
        }
        Ok(ClusterStatusResult {
            cluster_status: ClusterState::Running,
            openshift_status: Some(OpenShiftStatus::Running),
            openshift_version: Some("4.17.3".to_string()),
            podman_version: None,
            disk_use: 10_000_000_000,
            disk_size: 20_000_000_000,
            ram_use: 1_000_000_000,
            ram_size: 2_000_000_000,
        })
    }

    async fn exists(&self) -> Result<bool> {
        Ok(true)
    }

    async fn console_url(&self) -> Result<ConsoleResult> {
        if self.failing {
            return Err(CoreError::machine("console failed"));
        }
        Ok(ConsoleResult {
            cluster_config: Self::dummy_cluster_config(),
            state: ClusterState::Running,
        })
    }

    async fn connection_details(&self) -> Result<ConnectionDetails> {
        Ok(ConnectionDetails {
            ip: "127.0.0.1".to_string(),
            ssh_port: shiftbox_constants::DEFAULT_SSH_PORT,
            ssh_username: shiftbox_constants::SSH_USERNAME.to_string(),
            ssh_keys: vec![PathBuf::from("/tmp/id_ecdsa")],
        })
    }

    async fn cluster_load(&self) -> Result<ClusterLoadResult> {
        if self.failing {
            return Err(CoreError::machine("broken"));
        }
        Ok(ClusterLoadResult {
            ram_use: 1_000_000_000,
            ram_size: 2_000_000_000,
            cpu_use: vec![10, 20, 30, 40],
        })
    }

    async fn is_running(&self) -> Result<bool> {
        Ok(!self.failing)
    }

    async fn generate_bundle(&self, _force_stop: bool) -> Result<()> {
        if self.failing {
            return Err(CoreError::machine("bundle generation failed"));
        }
        Ok(())
    }
}
