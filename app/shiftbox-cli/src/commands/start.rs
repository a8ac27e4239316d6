//! Start command implementation.

use anyhow::Result;
use clap::Args;
use shiftbox_cli::DaemonClient;
use shiftbox_core::machine::{Preset, StartResult};
use std::path::PathBuf;

/// Arguments for the start command.
#[derive(Args)]
pub struct StartArgs {
    /// Bundle disk image to boot
    #[arg(short, long)]
    pub bundle: Option<PathBuf>,

    /// Memory size in MiB
    #[arg(short, long)]
    pub memory: Option<u64>,

    /// Number of vCPUs
    #[arg(short, long)]
    pub cpus: Option<u32>,

    /// Disk size in GiB
    #[arg(short, long)]
    pub disk_size: Option<u64>,

    /// Cluster preset (openshift, microshift, podman)
    #[arg(short, long)]
    pub preset: Option<Preset>,
}

/// Executes the start command.
pub async fn execute(args: StartArgs) -> Result<()> {
    let daemon = DaemonClient::resolve(None);

    let mut body = serde_json::Map::new();
    if let Some(bundle) = args.bundle {
        body.insert("bundlePath".into(), bundle.display().to_string().into());
    }
    if let Some(memory) = args.memory {
        body.insert("memoryMib".into(), memory.into());
    }
    if let Some(cpus) = args.cpus {
        body.insert("cpus".into(), cpus.into());
    }
    if let Some(disk_size) = args.disk_size {
        body.insert("diskSizeGib".into(), disk_size.into());
    }
    if let Some(preset) = args.preset {
        body.insert("preset".into(), preset.to_string().into());
    }
    let body = if body.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(body))
    };

    println!("Starting the cluster, this may take a few minutes...");
    let result: StartResult = daemon.post("/start", body).await?;

    println!("The cluster is {}", result.status);
    if result.kubelet_started {
        let config = &result.cluster_config;
        println!();
        println!("To access the cluster:");
        println!("  API:         {}", config.cluster_api);
        println!("  Console:     {}", config.web_console_url);
        println!("  Kubeconfig:  {}", config.kube_config.display());
    }
    Ok(())
}
