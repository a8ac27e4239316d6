//! Externally visible cluster state.

use serde::{Deserialize, Serialize};

/// Cluster runtime state as reported to clients and observers.
///
/// Distinct from the controller's internal lifecycle state: while an
/// operation is in flight this is derived from the controller, otherwise
/// from the underlying machine driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClusterState {
    /// Cluster VM is up and the cluster answers.
    Running,
    /// Cluster VM exists but is shut off.
    Stopped,
    /// Cluster VM is shutting down (or being deleted).
    Stopping,
    /// Cluster VM is booting.
    Starting,
    /// No cluster VM exists.
    #[serde(rename = "noVm")]
    NoVm,
    /// State could not be determined or the last operation failed.
    Error,
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Stopping => write!(f, "stopping"),
            Self::Starting => write!(f, "starting"),
            Self::NoVm => write!(f, "no VM"),
            Self::Error => write!(f, "error"),
        }
    }
}
