//! Version command implementation.

use anyhow::Result;
use serde::Deserialize;
use shiftbox_cli::DaemonClient;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionResponse {
    version: String,
    preset: String,
}

/// Executes the version command.
pub async fn execute() -> Result<()> {
    println!("shiftbox version: {}", env!("CARGO_PKG_VERSION"));

    match DaemonClient::resolve(None).get::<VersionResponse>("/version").await {
        Ok(daemon) => {
            println!("daemon version:   {}", daemon.version);
            println!("preset:           {}", daemon.preset);
        }
        Err(_) => println!("daemon:           not running"),
    }
    Ok(())
}
