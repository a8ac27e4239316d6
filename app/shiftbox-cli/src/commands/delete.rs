//! Delete command implementation.

use anyhow::{Result, bail};
use clap::Args;
use serde::Deserialize;
use shiftbox_cli::DaemonClient;
use std::io::Write;

/// Arguments for the delete command.
#[derive(Args)]
pub struct DeleteArgs {
    /// Delete without confirmation
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandResponse {
    success: bool,
}

/// Executes the delete command.
pub async fn execute(args: DeleteArgs) -> Result<()> {
    if !args.force && !confirm("Do you want to delete the cluster VM?")? {
        println!("Aborted.");
        return Ok(());
    }

    let daemon = DaemonClient::resolve(None);
    let response: CommandResponse = daemon.delete("/delete").await?;
    if !response.success {
        bail!("Deleting the cluster VM failed");
    }
    println!("Deleted the cluster VM");
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
