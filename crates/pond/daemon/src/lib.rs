//! Duckpond daemon library
//!
//! This module provides the pieces `pondd` wires together:
//! - the SMS webhook and health REST surface
//! - outbound SMS transports
//! - configuration loading
//! - server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod server;
pub mod transport;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use server::Server;
