//! Adapter mode tracking
//!
//! The adapter moves through a strict ladder of modes:
//!
//! ```text
//! Console -> BinaryBitbang -> UartControl -> UartBridge
//! ```
//!
//! Every mode change goes through [`AdapterMode::apply`], which rejects
//! out-of-order requests instead of trusting the caller. `Reset` is accepted
//! from anywhere and always lands in `Console`.

use crate::error::ProtocolError;

/// Current protocol mode of the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdapterMode {
    /// Interactive text console (power-on state)
    #[default]
    Console,
    /// Binary bit-bang root mode, answers `BBIO1`
    BinaryBitbang,
    /// Binary UART submode, accepts configuration commands
    UartControl,
    /// Transparent UART bridge, bytes are relayed verbatim
    UartBridge,
}

/// A requested mode change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Transition {
    /// Enter (or re-enter) binary bit-bang mode
    EnterBinary,
    /// Select the UART submode
    SelectUart,
    /// Configure the UART baud rate
    SetBaud,
    /// Start the transparent bridge
    StartBridge,
    /// The bridge was left from the adapter side (button press)
    BridgeExited,
    /// Return to the text console
    Reset,
}

impl AdapterMode {
    /// Apply a transition, returning the resulting mode
    ///
    /// The bridge cannot be left by sending bytes: everything written while
    /// bridged reaches the target, so only `BridgeExited` and `Reset` are
    /// accepted from `UartBridge`.
    pub fn apply(self, transition: Transition) -> Result<AdapterMode, ProtocolError> {
        use AdapterMode::*;
        use Transition::*;

        match (self, transition) {
            (_, Reset) => Ok(Console),
            (Console | BinaryBitbang | UartControl, EnterBinary) => Ok(BinaryBitbang),
            (BinaryBitbang, SelectUart) => Ok(UartControl),
            (UartControl, SetBaud) => Ok(UartControl),
            (UartControl, StartBridge) => Ok(UartBridge),
            (UartBridge, BridgeExited) => Ok(BinaryBitbang),
            (from, transition) => Err(ProtocolError::InvalidTransition { from, transition }),
        }
    }

    /// Returns true while bytes written to the link go to the target
    pub fn is_transparent(&self) -> bool {
        matches!(self, AdapterMode::UartBridge)
    }

    /// Returns a human-readable name for the mode
    pub fn name(&self) -> &'static str {
        match self {
            AdapterMode::Console => "console",
            AdapterMode::BinaryBitbang => "binary bit-bang",
            AdapterMode::UartControl => "UART control",
            AdapterMode::UartBridge => "UART bridge",
        }
    }
}
