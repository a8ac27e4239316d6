//! Power-off command implementation.

use anyhow::Result;
use serde::Deserialize;
use shiftbox_cli::DaemonClient;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandResponse {
    #[allow(dead_code)]
    success: bool,
}

/// Executes the power-off command.
pub async fn execute() -> Result<()> {
    let daemon = DaemonClient::resolve(None);
    let _: CommandResponse = daemon.post("/poweroff", None).await?;
    println!("Powered off the cluster VM");
    Ok(())
}
