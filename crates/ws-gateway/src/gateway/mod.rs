//! WebSocket side of the gateway
//!
//! Clients connect through the upgrade handler, are tracked by the
//! [`ConnectionRegistry`], and exchange one JSON-RPC envelope per frame.

pub mod handler;
pub mod registry;

pub use handler::ws_upgrade_handler;
pub use registry::{
    BroadcastReport, ConnectionId, ConnectionRegistry, RegistryEvent, SendFailure, SendOutcome,
};
