//! Serial port scanner
//!
//! Lists serial ports and flags the ones that look like a binary-mode
//! bridge adapter.

use serialport::{available_ports, SerialPortType};
use tracing::info;

use crate::error::DetectError;
use crate::usb_ids;

/// Information about a serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyACM0, COM3)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB product string
    pub product: Option<String>,
    /// Known adapter this port matches, if any
    pub adapter: Option<&'static str>,
}

impl SerialPortInfo {
    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product.clone(),
                adapter: usb_ids::adapter_name(usb.vid, usb.pid),
            },
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                product: None,
                adapter: None,
            },
        }
    }

    /// Returns true if the port matches a known adapter
    pub fn is_adapter(&self) -> bool {
        self.adapter.is_some()
    }
}

/// Serial port scanner
#[derive(Debug, Clone, Default)]
pub struct PortScanner;

impl PortScanner {
    pub fn new() -> Self {
        Self
    }

    /// Enumerate all available serial ports, known adapters first
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        info!("Enumerating serial ports...");
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let mut result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .collect();
        result.sort_by_key(|p| !p.is_adapter());

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                let desc = match (port.adapter, port.product.as_deref()) {
                    (Some(adapter), _) => adapter,
                    (None, Some(product)) => product,
                    (None, None) => "Unknown",
                };
                info!("  {} - {}", port.port, desc);
            }
        }

        Ok(result)
    }

    /// Name of the first port that looks like an adapter
    pub fn find_adapter(&self) -> Result<Option<String>, DetectError> {
        Ok(self
            .enumerate_ports()?
            .into_iter()
            .find(|p| p.is_adapter())
            .map(|p| p.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_serial_port_info_from_hydrabus() {
        let usb_info = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x1D50,
            pid: 0x60A7,
            serial_number: Some("3473".to_string()),
            manufacturer: Some("HydraBus".to_string()),
            product: Some("HydraBus 1.0 COM Port".to_string()),
        });

        let info = SerialPortInfo::from_serialport("/dev/ttyACM0".to_string(), &usb_info);

        assert_eq!(info.vid, Some(0x1D50));
        assert_eq!(info.pid, Some(0x60A7));
        assert_eq!(info.adapter, Some("Hydrabus"));
        assert!(info.is_adapter());
    }

    #[test]
    fn test_serial_port_info_non_usb() {
        let info = SerialPortInfo::from_serialport("/dev/ttyS0".to_string(), &SerialPortType::Unknown);
        assert_eq!(info.vid, None);
        assert!(!info.is_adapter());
    }
}
