//! Adapter command encoding and acknowledgement checks
//!
//! # Command Set
//! ```text
//! Intent                     Sent            Answer
//! enter binary mode          0x00 (x <=20)   "BBIO1"
//! select UART submode        0x03            "ART1"
//! set baud                   0x64..=0x6A     0x01
//! start transparent bridge   0x0F            -
//! reset to console           0x00 0x0F       -
//! trigger target             0x0D 0x0A       echoed "\r\n"
//! ```
//!
//! The adapter answers `0x00` with `BBIO1` from the console (after enough
//! of them), from binary mode and from any binary submode, which makes it
//! both the entry and the re-synchronisation command.

use crate::baud::BaudCandidate;
use crate::EncodeCommand;

/// Priming byte for binary mode entry
pub const BINARY_MODE_ENTRY: u8 = 0x00;

/// UART submode selection command
pub const UART_MODE_SELECT: u8 = 0x03;

/// Transparent bridge activation command
pub const START_BRIDGE: u8 = 0x0F;

/// Leave binary mode and return to the console
pub const CONSOLE_RESET: u8 = 0x0F;

/// Acknowledgement byte for a successful configuration command
pub const ACK: u8 = 0x01;

/// Banner sent when binary bit-bang mode is (re)entered
pub const BBIO_BANNER: &[u8] = b"BBIO1";

/// Prefix of the banner, enough to recognise the adapter leaving the bridge
pub const BBIO_BANNER_PREFIX: &[u8] = b"BBIO";

/// Identifier sent when the UART submode is selected
pub const UART_BANNER: &[u8] = b"ART1";

/// Length of the UART submode identifier
pub const UART_BANNER_LEN: usize = 4;

/// Wake-up sequence written to a silent target
pub const TRIGGER: &[u8] = b"\r\n";

/// Default number of priming bytes sent before giving up on binary mode
pub const DEFAULT_HANDSHAKE_ATTEMPTS: usize = 20;

/// Commands understood by the adapter in binary mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdapterCommand {
    /// One priming byte towards binary mode
    EnterBinary,
    /// Switch binary mode to the UART submode
    SelectUart,
    /// Configure the UART to a candidate rate
    SetBaud(BaudCandidate),
    /// Start the transparent UART bridge
    StartBridge,
    /// Leave whatever binary mode is active and return to the console
    ResetToConsole,
    /// Wake-up sequence for the target (only meaningful while bridged)
    Trigger,
}

impl AdapterCommand {
    /// Number of answer bytes the adapter sends back, if any
    pub fn response_len(&self) -> usize {
        match self {
            AdapterCommand::EnterBinary => BBIO_BANNER.len(),
            AdapterCommand::SelectUart => UART_BANNER_LEN,
            AdapterCommand::SetBaud(_) => 1,
            AdapterCommand::StartBridge | AdapterCommand::ResetToConsole => 0,
            AdapterCommand::Trigger => TRIGGER.len(),
        }
    }
}

impl EncodeCommand for AdapterCommand {
    fn encode(&self) -> Vec<u8> {
        match self {
            AdapterCommand::EnterBinary => vec![BINARY_MODE_ENTRY],
            AdapterCommand::SelectUart => vec![UART_MODE_SELECT],
            AdapterCommand::SetBaud(candidate) => vec![candidate.select_code],
            AdapterCommand::StartBridge => vec![START_BRIDGE],
            AdapterCommand::ResetToConsole => vec![BINARY_MODE_ENTRY, CONSOLE_RESET],
            AdapterCommand::Trigger => TRIGGER.to_vec(),
        }
    }
}

/// Check whether a response buffer contains the binary mode banner
pub fn is_bbio_banner(response: &[u8]) -> bool {
    contains(response, BBIO_BANNER)
}

/// Check whether a response buffer shows the adapter leaving the bridge
pub fn is_bridge_exit(response: &[u8]) -> bool {
    contains(response, BBIO_BANNER_PREFIX)
}

/// Check whether a response buffer contains the UART submode identifier
pub fn is_uart_banner(response: &[u8]) -> bool {
    contains(response, UART_BANNER)
}

/// Check whether a configuration answer is the success acknowledgement
pub fn is_ack(response: &[u8]) -> bool {
    response == [ACK]
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baud::CANDIDATES;

    #[test]
    fn test_encode_fixed_commands() {
        assert_eq!(AdapterCommand::EnterBinary.encode(), vec![0x00]);
        assert_eq!(AdapterCommand::SelectUart.encode(), vec![0x03]);
        assert_eq!(AdapterCommand::StartBridge.encode(), vec![0x0F]);
        assert_eq!(AdapterCommand::ResetToConsole.encode(), vec![0x00, 0x0F]);
        assert_eq!(AdapterCommand::Trigger.encode(), vec![0x0D, 0x0A]);
    }

    #[test]
    fn test_encode_set_baud_uses_select_code() {
        let encoded: Vec<u8> = CANDIDATES
            .iter()
            .flat_map(|c| AdapterCommand::SetBaud(*c).encode())
            .collect();
        assert_eq!(encoded, vec![0x64, 0x65, 0x66, 0x67, 0x6A]);
    }

    #[test]
    fn test_response_lengths() {
        assert_eq!(AdapterCommand::EnterBinary.response_len(), 5);
        assert_eq!(AdapterCommand::SelectUart.response_len(), 4);
        assert_eq!(AdapterCommand::SetBaud(CANDIDATES[0]).response_len(), 1);
        assert_eq!(AdapterCommand::StartBridge.response_len(), 0);
    }

    #[test]
    fn test_banner_detection() {
        assert!(is_bbio_banner(b"BBIO1"));
        assert!(is_bbio_banner(b"\x00\x00BBIO1"));
        assert!(!is_bbio_banner(b"BBIO"));
        assert!(!is_bbio_banner(b""));
        assert!(is_bridge_exit(b"garbageBBIO"));
        assert!(is_uart_banner(b"ART1"));
        assert!(!is_uart_banner(b"SPI1"));
    }

    #[test]
    fn test_ack() {
        assert!(is_ack(&[0x01]));
        assert!(!is_ack(&[0x00]));
        assert!(!is_ack(&[]));
        assert!(!is_ack(&[0x01, 0x01]));
    }
}
