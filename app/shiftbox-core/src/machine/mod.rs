//! Machine drivers and lifecycle coordination.
//!
//! A "machine" is the single VM carrying the cluster. Drivers implement
//! [`Client`]; callers never talk to a driver directly but go through
//! [`Synchronized`], which serializes mutating operations and broadcasts
//! status transitions.

pub mod fake;
pub mod macadam;
mod state;
pub mod synced;
mod types;

pub use state::ClusterState;
pub use synced::{LifecycleState, Synchronized};
pub use types::{
    ClusterConfig, ClusterLoadResult, ClusterStatusResult, ConnectionDetails, ConsoleResult,
    OpenShiftStatus, Preset, StartConfig, StartResult,
};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared machine client trait object.
pub type DynClient = Arc<dyn Client>;

/// Capability set a VM driver must provide.
///
/// Only one mutating call (`start`, `stop`, `delete`, `power_off`) reaches a
/// driver at a time; [`Synchronized`] guarantees that, so drivers need no
/// mutating-call lock of their own.
///
/// `start` receives a [`CancellationToken`] and MUST observe it: once the
/// token is cancelled the driver has to abandon the boot and return promptly
/// (typically with [`CoreError::Canceled`](crate::CoreError::Canceled)).
/// The controller cannot enforce this; a driver that ignores cancellation
/// makes competing stop/delete requests fail with a timeout.
#[async_trait]
pub trait Client: Send + Sync {
    /// Machine name.
    fn name(&self) -> &str;

    /// Cluster preset this machine runs.
    fn preset(&self) -> Preset;

    /// Boots the VM and brings the cluster up. May take minutes.
    async fn start(&self, cancel: CancellationToken, config: StartConfig) -> Result<StartResult>;

    /// Gracefully shuts the VM down and reports the resulting state.
    async fn stop(&self) -> Result<ClusterState>;

    /// Removes the VM and its disks.
    async fn delete(&self) -> Result<()>;

    /// Hard-stops the VM without a guest shutdown.
    async fn power_off(&self) -> Result<()>;

    /// Full status snapshot of VM and cluster payload.
    async fn status(&self) -> Result<ClusterStatusResult>;

    /// Whether the VM exists at all.
    async fn exists(&self) -> Result<bool>;

    /// Web console location and login details.
    async fn console_url(&self) -> Result<ConsoleResult>;

    /// SSH connection details of the VM.
    async fn connection_details(&self) -> Result<ConnectionDetails>;

    /// Instantaneous resource usage of the VM.
    async fn cluster_load(&self) -> Result<ClusterLoadResult>;

    /// Whether the VM is currently running.
    async fn is_running(&self) -> Result<bool>;

    /// Packages the current VM disk into a reusable bundle.
    async fn generate_bundle(&self, force_stop: bool) -> Result<()>;
}
