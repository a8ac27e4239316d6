use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use shiftbox_api::{ApiServer, AppState, ServerConfig};
use shiftbox_core::machine::fake::FakeMachine;
use shiftbox_core::machine::macadam::MacadamMachine;
use shiftbox_core::{Config, DynClient, EventBus, StatusChannel, Synchronized};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "shiftbox-daemon")]
#[command(author, version, about, long_about = None)]
pub struct DaemonArgs {
    /// Unix socket path for the API (default: <data-dir>/api.sock).
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Data directory for shiftbox.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file (default: standard config locations).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Machine driver.
    #[arg(long, value_enum, default_value_t = DriverArg::Macadam)]
    pub driver: DriverArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DriverArg {
    /// Drive VMs through the macadam helper binary.
    Macadam,
    /// In-memory fake machine (development and CI).
    Fake,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shiftbox=info,shiftbox_daemon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    run(DaemonArgs::parse()).await
}

async fn run(args: DaemonArgs) -> Result<()> {
    info!("Starting shiftbox daemon...");

    let mut config = match &args.config {
        Some(path) => Config::load_from(path).context("Failed to load configuration file")?,
        None => Config::load().context("Failed to load configuration")?,
    };
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    std::fs::create_dir_all(&config.data_dir).context("Failed to create data directory")?;
    let pid_file = config.pid_file();
    std::fs::write(&pid_file, format!("{}\n", std::process::id()))
        .context("Failed to write daemon PID file")?;

    let socket_path = args.socket.unwrap_or_else(|| config.api_socket_path());

    let status_events: StatusChannel = Arc::new(EventBus::new());
    let client: DynClient = match args.driver {
        DriverArg::Macadam => Arc::new(MacadamMachine::new(config.machine.clone())),
        DriverArg::Fake => {
            warn!("Using the fake machine driver; no VM will be managed");
            Arc::new(FakeMachine::new())
        }
    };

    info!(
        machine = client.name(),
        preset = %client.preset(),
        "Machine driver initialized"
    );

    let state = AppState {
        machine: Arc::new(Synchronized::new(client, status_events.clone())),
        status_events,
        config: Arc::new(config),
    };

    let server = ApiServer::new(
        ServerConfig {
            socket_path: socket_path.clone(),
        },
        state,
    );

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!("API server error: {e}");
        }
    });

    println!("shiftbox daemon started");
    println!("  API socket: {}", socket_path.display());
    println!();
    println!("Press Ctrl+C to stop.");

    shutdown_signal().await;
    info!("Shutdown signal received");

    server_handle.abort();

    if let Err(e) = std::fs::remove_file(&socket_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove socket {}: {}", socket_path.display(), e);
        }
    }

    if let Err(e) = std::fs::remove_file(&pid_file) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove PID file {}: {}", pid_file.display(), e);
        }
    }

    info!("shiftbox daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
