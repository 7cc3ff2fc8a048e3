//! Error types for baud rate detection

use bbio_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur around a detection run
#[derive(Debug, Error)]
pub enum DetectError {
    /// The adapter protocol failed
    #[error("adapter protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error on the adapter link
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The interaction port could not reach the operator
    #[error("interaction failed: {0}")]
    Interaction(String),

    /// Failed to open the adapter's serial port
    #[error("failed to open port {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),
}
