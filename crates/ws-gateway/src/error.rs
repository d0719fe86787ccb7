//! Error types for the gateway server

use std::net::SocketAddr;

use thiserror::Error;

/// Startup failures; everything after startup is handled as a shutdown reason
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] wsgw_core::Error),

    #[error(transparent)]
    Child(#[from] stdio_runner::RunnerError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
