//! Stop command implementation.

use anyhow::Result;
use serde::Deserialize;
use shiftbox_cli::DaemonClient;
use shiftbox_core::machine::ClusterState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopResponse {
    state: ClusterState,
}

/// Executes the stop command.
pub async fn execute() -> Result<()> {
    let daemon = DaemonClient::resolve(None);

    println!("Stopping the cluster, this may take a few minutes...");
    let response: StopResponse = daemon.post("/stop", None).await?;
    println!("The cluster is {}", response.state);
    Ok(())
}
