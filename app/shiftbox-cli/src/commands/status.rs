//! Status command implementation.

use anyhow::Result;
use clap::Args;
use shiftbox_cli::DaemonClient;
use shiftbox_core::machine::ClusterStatusResult;

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Print the raw JSON response
    #[arg(long)]
    pub json: bool,
}

/// Executes the status command.
pub async fn execute(args: StatusArgs) -> Result<()> {
    let daemon = DaemonClient::resolve(None);
    let status: ClusterStatusResult = daemon.get("/status").await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Cluster VM:      {}", status.cluster_status);
    if let Some(openshift_status) = status.openshift_status {
        let version = status
            .openshift_version
            .map(|v| format!(" (v{v})"))
            .unwrap_or_default();
        println!("OpenShift:       {openshift_status}{version}");
    }
    if let Some(podman_version) = status.podman_version {
        println!("Podman:          v{podman_version}");
    }
    if status.disk_size > 0 {
        println!(
            "Disk usage:      {} of {}",
            human_bytes(status.disk_use),
            human_bytes(status.disk_size)
        );
    }
    if status.ram_size > 0 {
        println!(
            "RAM usage:       {} of {}",
            human_bytes(status.ram_use),
            human_bytes(status.ram_size)
        );
    }
    Ok(())
}

/// Renders a byte count with a binary unit suffix.
fn human_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes.max(0) as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512B");
        assert_eq!(human_bytes(2048), "2.0KiB");
        assert_eq!(human_bytes(10_000_000_000), "9.3GiB");
    }
}
