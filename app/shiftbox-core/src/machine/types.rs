//! Request and result types exchanged with machine drivers.

use super::state::ClusterState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Cluster flavor shipped in a bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Single-node OpenShift.
    #[default]
    OpenShift,
    /// MicroShift (edge-sized OpenShift).
    MicroShift,
    /// Plain Podman machine.
    Podman,
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenShift => write!(f, "openshift"),
            Self::MicroShift => write!(f, "microshift"),
            Self::Podman => write!(f, "podman"),
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openshift" => Ok(Self::OpenShift),
            "microshift" => Ok(Self::MicroShift),
            "podman" => Ok(Self::Podman),
            other => Err(format!("unknown preset '{other}'")),
        }
    }
}

/// Parameters for starting the cluster VM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartConfig {
    /// Path to the cluster bundle disk image.
    pub bundle_path: Option<PathBuf>,
    /// Memory size in MiB.
    pub memory_mib: u64,
    /// Number of vCPUs.
    pub cpus: u32,
    /// Disk size in GiB.
    pub disk_size_gib: u64,
    /// Nameserver pushed into the VM.
    pub nameserver: Option<String>,
    /// User-defined kubeadmin password.
    pub kubeadmin_password: Option<String>,
    /// Cluster preset.
    pub preset: Preset,
}

/// Connection and credential details of a running cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// Cluster preset this configuration belongs to.
    pub cluster_type: Preset,
    /// Base64-encoded cluster CA certificate.
    pub cluster_ca_cert: String,
    /// Path to the admin kubeconfig.
    pub kube_config: PathBuf,
    /// kubeadmin password.
    pub kubeadmin_pass: String,
    /// Kubernetes API URL.
    pub cluster_api: String,
    /// Web console URL.
    pub web_console_url: String,
}

/// Outcome of a successful (or failed) start operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResult {
    /// Cluster state after the start attempt.
    pub status: ClusterState,
    /// Connection details of the started cluster.
    pub cluster_config: ClusterConfig,
    /// Whether the kubelet came up.
    pub kubelet_started: bool,
}

/// Health of the cluster payload inside the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenShiftStatus {
    /// API server does not answer.
    Unreachable,
    /// Cluster operators are progressing.
    Starting,
    /// Cluster is fully available.
    Running,
    /// One or more cluster operators are degraded.
    Degraded,
    /// Cluster is not running.
    Stopped,
    /// Cluster is shutting down.
    Stopping,
}

impl std::fmt::Display for OpenShiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable => write!(f, "Unreachable"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Full status snapshot returned by `status()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatusResult {
    /// VM-level state.
    pub cluster_status: ClusterState,
    /// OpenShift payload health, when the preset carries OpenShift.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openshift_status: Option<OpenShiftStatus>,
    /// OpenShift version shipped in the bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openshift_version: Option<String>,
    /// Podman version shipped in the bundle (podman preset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub podman_version: Option<String>,
    /// Bytes used on the VM root partition.
    pub disk_use: i64,
    /// Size of the VM root partition in bytes.
    pub disk_size: i64,
    /// Bytes of guest RAM in use.
    pub ram_use: i64,
    /// Bytes of guest RAM available.
    pub ram_size: i64,
}

impl ClusterStatusResult {
    /// Builds the synthesized snapshot reported while a lifecycle operation
    /// is in flight.
    #[must_use]
    pub const fn transitional(state: ClusterState) -> Self {
        Self {
            cluster_status: state,
            openshift_status: None,
            openshift_version: None,
            podman_version: None,
            disk_use: 0,
            disk_size: 0,
            ram_use: 0,
            ram_size: 0,
        }
    }
}

/// Instantaneous resource usage of the cluster VM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLoadResult {
    /// Bytes of guest RAM in use.
    pub ram_use: i64,
    /// Bytes of guest RAM available.
    pub ram_size: i64,
    /// Per-vCPU usage, percent.
    pub cpu_use: Vec<i64>,
}

/// Console location plus the cluster configuration needed to log in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleResult {
    /// Connection details of the cluster.
    pub cluster_config: ClusterConfig,
    /// VM-level state at the time of the query.
    pub state: ClusterState,
}

/// SSH connection details of the cluster VM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    /// VM IP address.
    pub ip: String,
    /// SSH port.
    pub ssh_port: u16,
    /// SSH user.
    pub ssh_username: String,
    /// Candidate private key paths.
    pub ssh_keys: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_round_trip() {
        for preset in [Preset::OpenShift, Preset::MicroShift, Preset::Podman] {
            assert_eq!(preset.to_string().parse::<Preset>().unwrap(), preset);
        }
        assert!("hyperv".parse::<Preset>().is_err());
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = ClusterStatusResult {
            openshift_version: Some("4.17.3".to_string()),
            ..ClusterStatusResult::transitional(ClusterState::Running)
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["clusterStatus"], "running");
        assert_eq!(json["openshiftVersion"], "4.17.3");
        assert!(json.get("podmanVersion").is_none());
    }
}
