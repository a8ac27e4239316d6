//! Console command implementation.

use anyhow::Result;
use clap::Args;
use shiftbox_cli::DaemonClient;
use shiftbox_core::machine::ConsoleResult;

/// Arguments for the console command.
#[derive(Args)]
pub struct ConsoleArgs {
    /// Print only the console URL
    #[arg(long)]
    pub url: bool,

    /// Print login credentials as well
    #[arg(long)]
    pub credentials: bool,
}

/// Executes the console command.
pub async fn execute(args: ConsoleArgs) -> Result<()> {
    let daemon = DaemonClient::resolve(None);
    let console: ConsoleResult = daemon.get("/webconsoleurl").await?;

    if args.url {
        println!("{}", console.cluster_config.web_console_url);
        return Ok(());
    }

    println!("Console URL: {}", console.cluster_config.web_console_url);
    println!("Cluster VM:  {}", console.state);
    if args.credentials {
        println!(
            "To login as an admin, run 'oc login -u kubeadmin -p {} {}'",
            console.cluster_config.kubeadmin_pass, console.cluster_config.cluster_api
        );
    }
    Ok(())
}
