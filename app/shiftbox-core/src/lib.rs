//! # shiftbox-core
//!
//! Cluster lifecycle coordination for `shiftbox`.
//!
//! This crate owns the pieces every entry point (daemon, CLI, API server)
//! shares:
//!
//! - the [`machine::Client`] capability the VM drivers implement,
//! - the [`machine::Synchronized`] wrapper that serializes lifecycle
//!   operations against a single stateful VM,
//! - the [`events::EventBus`] used to fan out status changes to observers,
//! - configuration loading.
//!
//! ## Architecture
//!
//! ```text
//! CLI / HTTP API ──► Synchronized ──► dyn Client (macadam, fake)
//!                        │
//!                        ▼
//!                  EventBus<StatusChangedEvent> ──► SSE / WebSocket adapters
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod events;
pub mod machine;

pub use config::Config;
pub use error::{CoreError, Result};
pub use events::{EventBus, Notifiable, StatusChannel, StatusChangedEvent};
pub use machine::{Client, DynClient, Synchronized};
