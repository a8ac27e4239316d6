//! shiftbox CLI - local OpenShift/MicroShift cluster manager.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set SHIFTBOX_SOCKET if --socket was provided so DaemonClient's env
    // lookup picks it up.
    // SAFETY: called at the start of main(), before any threads are spawned.
    if let Some(ref socket) = cli.socket {
        unsafe {
            std::env::set_var("SHIFTBOX_SOCKET", socket.as_os_str());
        }
    }

    let filter = if cli.debug {
        "shiftbox=debug,shiftbox_cli=debug"
    } else {
        "shiftbox=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Start(args) => commands::start::execute(args).await,
        Commands::Stop => commands::stop::execute().await,
        Commands::Delete(args) => commands::delete::execute(args).await,
        Commands::PowerOff => commands::poweroff::execute().await,
        Commands::Status(args) => commands::status::execute(args).await,
        Commands::Console(args) => commands::console::execute(args).await,
        Commands::Version => commands::version::execute().await,
    }
}
