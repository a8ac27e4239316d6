//! Client-side pieces of the `shiftbox` CLI.
//!
//! The binary lives in `main.rs`; this library exposes the daemon client so
//! command implementations (and tests) can share it.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;

pub use client::DaemonClient;
