//! Core library for the stdio WebSocket gateway
//!
//! This crate contains the I/O-free building blocks shared by the process
//! supervisor and the WebSocket server:
//! - Line framing of the child's output stream
//! - JSON-RPC envelopes
//! - Bearer token authentication
//! - Gateway lifecycle state and configuration

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod framer;
pub mod lifecycle;

pub use auth::{AuthDecision, AuthGate, DenyReason};
pub use config::{CorsSetting, GatewayConfig};
pub use envelope::{Envelope, EnvelopeError};
pub use error::Error;
pub use framer::LineFramer;
pub use lifecycle::{Lifecycle, LifecyclePhase, ShutdownReason};

pub type Result<T> = std::result::Result<T, Error>;
