//! Error types for the adapter binary protocol

use thiserror::Error;

use crate::mode::{AdapterMode, Transition};

/// Handshake and mode faults reported by the adapter protocol
///
/// These are fatal for a detection run: the adapter is either unreachable
/// or not speaking the protocol we expect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The adapter never answered the binary mode banner
    #[error("adapter did not enter binary mode after {attempts} attempts")]
    HandshakeFailed { attempts: usize },

    /// The adapter answered the UART submode request with something else
    #[error("adapter refused UART mode (answered {response:02X?})")]
    UnsupportedMode { response: Vec<u8> },

    /// A command was issued in a mode that cannot accept it
    #[error("cannot {transition:?} while adapter is in {from:?} mode")]
    InvalidTransition {
        from: AdapterMode,
        transition: Transition,
    },

    /// A target read or write was attempted outside the transparent bridge
    #[error("target is not bridged while adapter is in {mode:?} mode")]
    NotBridged { mode: AdapterMode },

    /// The link to the adapter failed underneath the protocol
    #[error("adapter link error: {0}")]
    Link(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Link(err.to_string())
    }
}
