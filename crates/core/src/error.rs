//! Error types for the core library

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid envelope: {0}")]
    Envelope(#[from] crate::envelope::EnvelopeError),
}
