//! Candidate baud rates and their adapter select codes

use std::fmt;

/// A baud rate the adapter can be configured to, with its select code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaudCandidate {
    /// Rate in bits per second
    pub rate: u32,
    /// Command byte that selects this rate in UART mode
    pub select_code: u8,
}

impl BaudCandidate {
    pub const fn new(rate: u32, select_code: u8) -> Self {
        Self { rate, select_code }
    }
}

impl fmt::Display for BaudCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} baud", self.rate)
    }
}

/// The scan plan, in scan order
///
/// The order is part of the observable behaviour: traces of a run must be
/// reproducible, so this is never sorted or deduplicated at runtime.
pub const CANDIDATES: [BaudCandidate; 5] = [
    BaudCandidate::new(9600, 0x64),
    BaudCandidate::new(19200, 0x65),
    BaudCandidate::new(38400, 0x66),
    BaudCandidate::new(57600, 0x67),
    BaudCandidate::new(115200, 0x6A),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_order() {
        let rates: Vec<u32> = CANDIDATES.iter().map(|c| c.rate).collect();
        assert_eq!(rates, vec![9600, 19200, 38400, 57600, 115200]);
    }

    #[test]
    fn test_display() {
        assert_eq!(CANDIDATES[2].to_string(), "38400 baud");
    }
}
