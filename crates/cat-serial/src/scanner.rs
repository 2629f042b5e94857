//! Serial port discovery
//!
//! Lists the serial ports a radio could be on and ranks them: ports that
//! belong to a radio's own USB interface first, then common USB-to-serial
//! bridges, then everything else. Bluetooth and debug pseudo-ports are
//! never listed.

use cat_protocol::Protocol;
use serde::Serialize;
use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::DetectError;

/// Port names containing any of these are not radios
const SKIPPED_NAMES: &[&str] = &["Bluetooth", "debug"];

/// What sits behind a serial port, judged from its USB IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PortKind {
    /// A radio's built-in USB interface
    Radio {
        manufacturer: &'static str,
        protocol: Protocol,
    },
    /// A USB-to-serial bridge, as used in CAT cables and many radios
    Bridge { chip: &'static str },
    /// Anything else, including on-board UARTs
    Other,
}

/// Known USB vendor IDs (product ID `None` matches every product)
static USB_IDS: &[(u16, Option<u16>, PortKind)] = &[
    (
        0x0C26,
        None,
        PortKind::Radio {
            manufacturer: "Icom",
            protocol: Protocol::IcomCiv,
        },
    ),
    (
        0x0B28,
        None,
        PortKind::Radio {
            manufacturer: "Kenwood",
            protocol: Protocol::Kenwood,
        },
    ),
    (0x10C4, Some(0xEA60), PortKind::Bridge { chip: "CP210x" }),
    (0x10C4, Some(0xEA70), PortKind::Bridge { chip: "CP2105" }),
    (0x10C4, Some(0xEA71), PortKind::Bridge { chip: "CP2108" }),
    (0x0403, None, PortKind::Bridge { chip: "FTDI" }),
    (0x1A86, None, PortKind::Bridge { chip: "CH340" }),
    (0x067B, None, PortKind::Bridge { chip: "PL2303" }),
];

impl PortKind {
    /// Classify a port from its USB vendor and product IDs
    pub fn from_usb(vid: Option<u16>, pid: Option<u16>) -> Self {
        let Some(vid) = vid else {
            return PortKind::Other;
        };
        USB_IDS
            .iter()
            .find(|(v, p, _)| *v == vid && p.map_or(true, |p| Some(p) == pid))
            .map(|(_, _, kind)| *kind)
            .unwrap_or(PortKind::Other)
    }

    /// Protocol the device behind the port most likely speaks
    pub fn suggested_protocol(&self) -> Option<Protocol> {
        match self {
            PortKind::Radio { protocol, .. } => Some(*protocol),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            PortKind::Radio { .. } => 0,
            PortKind::Bridge { .. } => 1,
            PortKind::Other => 2,
        }
    }
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortKind::Radio { manufacturer, .. } => write!(f, "{} radio", manufacturer),
            PortKind::Bridge { chip } => write!(f, "{} bridge", chip),
            PortKind::Other => f.write_str("serial"),
        }
    }
}

/// A serial port a radio could be attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialPortInfo {
    /// Device path or name (`/dev/ttyUSB0`, `COM3`)
    pub port: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub kind: PortKind,
}

impl SerialPortInfo {
    fn new(port: String, port_type: &SerialPortType) -> Self {
        let (vid, pid, manufacturer, product) = match port_type {
            SerialPortType::UsbPort(usb) => (
                Some(usb.vid),
                Some(usb.pid),
                usb.manufacturer.clone(),
                usb.product.clone(),
            ),
            _ => (None, None, None, None),
        };
        Self {
            port,
            vid,
            pid,
            manufacturer,
            product,
            kind: PortKind::from_usb(vid, pid),
        }
    }

    /// Human-readable label: product, else manufacturer, else "Unknown"
    pub fn description(&self) -> &str {
        self.product
            .as_deref()
            .or(self.manufacturer.as_deref())
            .unwrap_or("Unknown")
    }
}

/// Lists candidate CAT ports
#[derive(Debug, Clone, Copy, Default)]
pub struct PortScanner;

impl PortScanner {
    pub fn new() -> Self {
        Self
    }

    /// Available ports, most likely radio first
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        let ports = available_ports()?
            .into_iter()
            .map(|p| SerialPortInfo::new(p.port_name, &p.port_type));
        let ranked = rank(ports);

        info!("Found {} serial port(s)", ranked.len());
        for port in &ranked {
            debug!("  {} - {} ({})", port.port, port.description(), port.kind);
        }
        Ok(ranked)
    }
}

/// Drop pseudo-ports and sort by kind, then by name
fn rank(ports: impl IntoIterator<Item = SerialPortInfo>) -> Vec<SerialPortInfo> {
    let mut kept: Vec<_> = ports
        .into_iter()
        .filter(|p| !SKIPPED_NAMES.iter().any(|s| p.port.contains(s)))
        .collect();
    kept.sort_by(|a, b| a.kind.rank().cmp(&b.kind.rank()).then_with(|| a.port.cmp(&b.port)));
    kept
}
