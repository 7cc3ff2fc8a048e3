//! USB Vendor/Product IDs of binary-mode UART bridge adapters

/// USB Vendor ID / Product ID pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

impl UsbId {
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }
}

/// Hydrabus (OpenMoko vendor ID)
pub const HYDRABUS: UsbId = UsbId::new(0x1D50, 0x60A7);

/// Bus Pirate v4 (Microchip vendor ID)
pub const BUS_PIRATE_V4: UsbId = UsbId::new(0x04D8, 0xFB00);

/// Bus Pirate v3 ships with a stock FTDI FT232R
pub const BUS_PIRATE_V3: UsbId = UsbId::new(0x0403, 0x6001);

/// Adapters that are known to speak the binary bit-bang protocol
///
/// The FT232R entry also matches unrelated FTDI cables, so a match is a
/// hint, not an identification.
pub const KNOWN_ADAPTERS: &[(UsbId, &str)] = &[
    (HYDRABUS, "Hydrabus"),
    (BUS_PIRATE_V4, "Bus Pirate v4"),
    (BUS_PIRATE_V3, "Bus Pirate v3 / FT232R"),
];

/// Look up the adapter name for a VID/PID pair
pub fn adapter_name(vid: u16, pid: u16) -> Option<&'static str> {
    KNOWN_ADAPTERS
        .iter()
        .find(|(id, _)| id.vid == vid && id.pid == pid)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_lookup() {
        assert_eq!(adapter_name(0x1D50, 0x60A7), Some("Hydrabus"));
        assert_eq!(adapter_name(0x04D8, 0xFB00), Some("Bus Pirate v4"));
        assert_eq!(adapter_name(0x10C4, 0xEA60), None);
    }
}
