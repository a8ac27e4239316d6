//! CLI command implementations.
//!
//! One module per subcommand; every command talks to the daemon through
//! `shiftbox_cli::DaemonClient` and renders the response for a terminal.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod console;
pub mod delete;
pub mod poweroff;
pub mod start;
pub mod status;
pub mod stop;
pub mod version;

/// shiftbox - run a local OpenShift/MicroShift cluster in a VM
#[derive(Parser)]
#[command(name = "shiftbox")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Unix socket path for the daemon connection
    ///
    /// Can also be set via the SHIFTBOX_SOCKET environment variable.
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the cluster
    Start(start::StartArgs),

    /// Stop the cluster
    Stop,

    /// Delete the cluster VM
    Delete(delete::DeleteArgs),

    /// Hard-stop the cluster VM without a guest shutdown
    PowerOff,

    /// Show cluster status
    Status(status::StatusArgs),

    /// Show the cluster web console URL and credentials
    Console(console::ConsoleArgs),

    /// Show version information
    Version,
}
