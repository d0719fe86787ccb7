//! WebSocket gateway for stdio JSON-RPC servers
//!
//! Runs one child process and relays its newline-delimited JSON-RPC output to
//! every connected WebSocket client, and client frames back to its stdin.

pub mod app;
pub mod auth;
pub mod cli;
pub mod error;
pub mod gateway;
pub mod relay;
pub mod routes;
pub mod state;

pub use app::{build_router, wait_for_signal, Gateway, ShutdownTrigger};
pub use error::{GatewayError, Result};
