//! # shiftbox-api
//!
//! Daemon HTTP API for `shiftbox`.
//!
//! Serves the lifecycle endpoints (`/start`, `/stop`, `/delete`,
//! `/poweroff`, `/status`, ...) over a unix socket, plus two streaming
//! surfaces fed by the core event bus:
//!
//! - `/events`: server-sent events, one message per cluster status change
//! - `/status_ws`: WebSocket pushing a cluster load sample every 2 seconds
//!
//! ## Architecture
//!
//! ```text
//! shiftbox CLI / GUI tray ──► Unix Socket ──► axum Router ──► Synchronized
//!                                                │
//!                                SSE / WS ◄── EventBus
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod events;
pub mod handlers;
pub mod server;
pub mod ws;

pub use error::{ApiError, Result};
pub use server::{ApiServer, ServerConfig};

use axum::Router;
use axum::routing::{get, post};
use shiftbox_core::{Config, StatusChannel, Synchronized};
use std::sync::Arc;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle controller.
    pub machine: Arc<Synchronized>,
    /// Status change bus the SSE adapter subscribes to.
    pub status_events: StatusChannel,
    /// Daemon configuration (start defaults).
    pub config: Arc<Config>,
}

/// Creates the API router with all endpoints.
#[must_use]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/start", get(handlers::start).post(handlers::start))
        .route("/stop", get(handlers::stop).post(handlers::stop))
        .route("/poweroff", post(handlers::power_off))
        .route("/status", get(handlers::status))
        .route("/delete", get(handlers::delete).delete(handlers::delete))
        .route("/webconsoleurl", get(handlers::web_console_url))
        .route("/version", get(handlers::version))
        .route("/events", get(events::events))
        .route("/status_ws", get(ws::status_ws))
        .with_state(state)
}
