//! Transport error types

use thiserror::Error;

/// Errors that can occur while delivering a control message
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Cannot resolve sink address: {0}")]
    AddressResolution(String),

    #[error("Sink is backpressured, message dropped")]
    Backpressure,

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Short write: sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Map an I/O error, treating `WouldBlock` as backpressure
    pub fn from_send(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::WouldBlock {
            TransportError::Backpressure
        } else {
            TransportError::Io(e)
        }
    }
}
