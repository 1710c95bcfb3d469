//! Relay server: listener, per-connection sessions and API handlers

pub mod config;
pub mod connection;
pub mod handler;
pub mod listener;

pub use config::{ServerConfig, DEFAULT_BOUNDARY, DEFAULT_PORT};
pub use connection::Connection;
pub use listener::RelayServer;
