//! BBIO Protocol Library
//!
//! This crate provides encoding and bookkeeping for the binary bit-bang
//! ("BBIO") protocol spoken by Hydrabus / Bus Pirate style UART bridge
//! adapters:
//!
//! - **Commands**: single-byte mode and configuration commands with their
//!   expected acknowledgements
//! - **Candidates**: the fixed baud rate scan plan and each rate's select code
//! - **Modes**: an explicit adapter mode state machine that rejects
//!   out-of-order transitions
//!
//! The crate does no I/O. Driving a real adapter over a link lives in
//! `bbio-detect`.
//!
//! # Example
//!
//! ```rust
//! use bbio_protocol::{AdapterCommand, AdapterMode, EncodeCommand, Transition, CANDIDATES};
//!
//! let mode = AdapterMode::Console
//!     .apply(Transition::EnterBinary)
//!     .and_then(|m| m.apply(Transition::SelectUart))
//!     .unwrap();
//! assert_eq!(mode, AdapterMode::UartControl);
//!
//! let bytes = AdapterCommand::SetBaud(CANDIDATES[0]).encode();
//! assert_eq!(bytes, vec![0x64]);
//! ```

pub mod baud;
pub mod command;
pub mod error;
pub mod mode;

pub use baud::{BaudCandidate, CANDIDATES};
pub use command::AdapterCommand;
pub use error::ProtocolError;
pub use mode::{AdapterMode, Transition};

/// Trait for commands that can be encoded to bytes
pub trait EncodeCommand {
    /// Encode this command to its wire format
    fn encode(&self) -> Vec<u8>;
}
