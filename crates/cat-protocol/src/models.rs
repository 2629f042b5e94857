//! Radio model database
//!
//! This module contains the radios the link knows how to drive, keyed by
//! their display name. Some radios speak a different command set than
//! their manufacturer's native one for part of their feature set; those
//! carry per-operation overrides.

use crate::{CatOperation, Protocol};

/// Information about a specific radio model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioModel {
    /// Display name, unique across the registry
    pub name: &'static str,
    /// Manufacturer name
    pub manufacturer: &'static str,
    /// Base protocol used by this radio
    pub protocol: Protocol,
    /// Baud rate used when the caller does not supply one
    pub default_baud: u32,
    /// CI-V address (Icom radios only)
    pub civ_address: Option<u8>,
    /// Operations routed through a protocol other than the base one
    pub overrides: &'static [(CatOperation, Protocol)],
}

impl RadioModel {
    /// Protocol used for one operation: the override if present, else the base protocol
    pub fn protocol_for(&self, op: CatOperation) -> Protocol {
        self.overrides
            .iter()
            .find(|(o, _)| *o == op)
            .map(|(_, p)| *p)
            .unwrap_or(self.protocol)
    }

    /// Address used when framing CI-V commands for this radio
    pub fn civ_address(&self) -> u8 {
        self.civ_address.unwrap_or(0x00)
    }

    /// Whether DTR and RTS should be asserted on the serial line
    ///
    /// Yaesu radios key the transmitter or reset the CAT interface when
    /// these lines are high, even when they are driven with Kenwood-style
    /// commands.
    pub fn asserts_control_lines(&self) -> bool {
        !(self.protocol == Protocol::Yaesu || self.manufacturer == "Yaesu")
    }
}

impl std::fmt::Display for RadioModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Database of known radio models
pub struct RadioDatabase;

impl RadioDatabase {
    /// Look up a radio model by its exact display name
    pub fn by_name(name: &str) -> Option<&'static RadioModel> {
        RADIOS.iter().find(|m| m.name == name)
    }

    /// All model names, in registry order
    pub fn model_names() -> impl Iterator<Item = &'static str> {
        RADIOS.iter().map(|m| m.name)
    }

    /// All known radios
    pub fn all() -> &'static [RadioModel] {
        RADIOS
    }

    /// Get all radios whose base protocol is `protocol`
    pub fn radios_for_protocol(protocol: Protocol) -> Vec<&'static RadioModel> {
        RADIOS.iter().filter(|m| m.protocol == protocol).collect()
    }
}

/// FT-DX series radios accept Kenwood-style ASCII commands for everything we do
static FTDX_KENWOOD_OVERRIDES: &[(CatOperation, Protocol)] = &[
    (CatOperation::GetFrequency, Protocol::Kenwood),
    (CatOperation::SetFrequency, Protocol::Kenwood),
    (CatOperation::GetMode, Protocol::Kenwood),
    (CatOperation::SetMode, Protocol::Kenwood),
];

const fn kenwood(name: &'static str, baud: u32) -> RadioModel {
    RadioModel {
        name,
        manufacturer: "Kenwood",
        protocol: Protocol::Kenwood,
        default_baud: baud,
        civ_address: None,
        overrides: &[],
    }
}

const fn yaesu(name: &'static str, baud: u32) -> RadioModel {
    RadioModel {
        name,
        manufacturer: "Yaesu",
        protocol: Protocol::Yaesu,
        default_baud: baud,
        civ_address: None,
        overrides: &[],
    }
}

const fn icom(name: &'static str, address: u8) -> RadioModel {
    RadioModel {
        name,
        manufacturer: "Icom",
        protocol: Protocol::IcomCiv,
        default_baud: 19200,
        civ_address: Some(address),
        overrides: &[],
    }
}

static RADIOS: &[RadioModel] = &[
    kenwood("Kenwood TS-480", 57600),
    kenwood("Kenwood TS-590", 115200),
    kenwood("Kenwood TS-890", 115200),
    yaesu("Yaesu FT-450", 38400),
    yaesu("Yaesu FT-891", 38400),
    yaesu("Yaesu FT-991", 38400),
    RadioModel {
        overrides: FTDX_KENWOOD_OVERRIDES,
        ..yaesu("Yaesu FT-DX10", 38400)
    },
    icom("Icom IC-7300", 0x94),
    icom("Icom IC-705", 0xA4),
    icom("Icom IC-9700", 0xA2),
    RadioModel {
        manufacturer: "Generic",
        ..kenwood("Generic Kenwood", 9600)
    },
    RadioModel {
        manufacturer: "Generic",
        ..yaesu("Generic Yaesu", 4800)
    },
    RadioModel {
        manufacturer: "Generic",
        ..icom("Generic Icom", 0x00)
    },
];
