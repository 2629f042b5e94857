//! CAT Protocol Library
//!
//! This crate provides byte-level encoding and decoding for the three
//! CAT (Computer Aided Transceiver) protocol families used to drive
//! amateur radio transceivers over a serial link:
//!
//! - **Kenwood**: ASCII semicolon-terminated commands with fixed-width decimal fields
//! - **Yaesu CAT**: 5-byte binary commands with BCD frequency encoding
//! - **Icom CI-V**: `FE FE`-framed binary messages with address-based routing
//!
//! # Architecture
//!
//! Each protocol module provides:
//! - Query/command frames for the four logical operations
//!   (see [`CatOperation`])
//! - Response decoders that tolerate short and noisy replies
//! - A static mode table mapping wire codes to mode names
//!
//! The [`models`] module holds the registry of supported radios, including
//! per-operation command overrides for radios that mix command sets, and
//! [`mode`] resolves operator-facing modes (SSB, FT8, ...) into the
//! sideband designation a protocol understands.
//!
//! # Example
//!
//! ```rust
//! use cat_protocol::{kenwood, CatOperation, RadioDatabase, Protocol};
//!
//! let model = RadioDatabase::by_name("Yaesu FT-DX10").unwrap();
//! assert_eq!(model.protocol, Protocol::Yaesu);
//! assert_eq!(model.protocol_for(CatOperation::GetFrequency), Protocol::Kenwood);
//!
//! let hz = kenwood::decode_frequency(b"FA014250000;").unwrap();
//! assert_eq!(hz, 14_250_000);
//! ```

pub mod error;
pub mod icom;
pub mod kenwood;
pub mod mode;
pub mod models;
pub mod yaesu;

pub use error::{ParseError, ProtocolError};
pub use mode::{resolve_mode, CwHandling, SidebandPair};
pub use models::{RadioDatabase, RadioModel};

/// Mode name reported when a radio returns a code missing from a mode table
pub const UNKNOWN_MODE: &str = "UNKNOWN";

/// Identifies which CAT protocol family a command is encoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Protocol {
    /// Kenwood-style ASCII commands (`FA;`, `IF;`, `MD..;`)
    Kenwood,
    /// Yaesu CAT protocol (5-byte binary commands, BCD frequency)
    Yaesu,
    /// Icom CI-V protocol (framed binary messages with addresses)
    IcomCiv,
}

impl Protocol {
    /// Returns a human-readable name for the protocol
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Kenwood => "Kenwood",
            Protocol::Yaesu => "Yaesu CAT",
            Protocol::IcomCiv => "Icom CI-V",
        }
    }

    /// Baud rates to try during auto-detection, most likely first
    pub fn baud_candidates(&self) -> &'static [u32] {
        match self {
            Protocol::Kenwood => &[57600, 115200, 38400, 19200, 9600, 4800],
            Protocol::Yaesu => &[38400, 19200, 9600, 4800],
            Protocol::IcomCiv => &[19200, 9600, 4800],
        }
    }

    /// Frequency query frame (`civ_address` is only used by CI-V)
    pub fn frequency_query(&self, civ_address: u8) -> Vec<u8> {
        match self {
            Protocol::Kenwood => kenwood::READ_FREQUENCY.to_vec(),
            Protocol::Yaesu => yaesu::READ_STATUS.to_vec(),
            Protocol::IcomCiv => icom::encode_read_frequency(civ_address),
        }
    }

    /// Upper bound on bytes read for a frequency reply
    pub fn frequency_read_len(&self) -> usize {
        match self {
            Protocol::Kenwood => kenwood::MAX_REPLY_LEN,
            Protocol::Yaesu => yaesu::STATUS_READ_LEN,
            Protocol::IcomCiv => icom::FREQUENCY_READ_LEN,
        }
    }

    /// Whether a frequency-query reply meets the minimum shape for this protocol
    ///
    /// This is the lightweight check used while probing baud rates; it does
    /// not require the reply to decode to a sensible frequency.
    pub fn is_plausible_frequency_reply(&self, response: &[u8]) -> bool {
        match self {
            Protocol::Kenwood => kenwood::digit_count(response) >= kenwood::MIN_FREQUENCY_DIGITS,
            Protocol::Yaesu => response.len() >= yaesu::COMMAND_LEN,
            Protocol::IcomCiv => {
                response.len() >= icom::MIN_PROBE_REPLY_LEN && response.starts_with(&icom::PREAMBLE)
            }
        }
    }

    /// Whether `buffer` holds a complete reply, so reading can stop early
    pub fn reply_complete(&self, op: CatOperation, buffer: &[u8]) -> bool {
        match self {
            Protocol::Kenwood => kenwood::reply_complete(buffer),
            Protocol::Yaesu => buffer.len() >= yaesu::COMMAND_LEN,
            Protocol::IcomCiv => icom::reply_complete(op, buffer),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The four logical operations a radio link performs
///
/// Radio models may route each operation through a different protocol
/// family (see [`RadioModel::protocol_for`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CatOperation {
    /// Read the VFO frequency
    GetFrequency,
    /// Tune the VFO
    SetFrequency,
    /// Read the operating mode
    GetMode,
    /// Change the operating mode
    SetMode,
}

impl CatOperation {
    /// All operations, in a stable order
    pub const ALL: [CatOperation; 4] = [
        CatOperation::GetFrequency,
        CatOperation::SetFrequency,
        CatOperation::GetMode,
        CatOperation::SetMode,
    ];

    /// Returns the snake_case name used in logs and settings
    pub fn name(&self) -> &'static str {
        match self {
            CatOperation::GetFrequency => "get_frequency",
            CatOperation::SetFrequency => "set_frequency",
            CatOperation::GetMode => "get_mode",
            CatOperation::SetMode => "set_mode",
        }
    }
}

impl std::fmt::Display for CatOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalize a mode name for table lookups (trimmed, upper case)
pub(crate) fn normalize_mode(mode: &str) -> String {
    mode.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_candidates_are_ordered_most_likely_first() {
        assert_eq!(Protocol::Kenwood.baud_candidates()[0], 57600);
        assert_eq!(Protocol::Yaesu.baud_candidates()[0], 38400);
        assert_eq!(Protocol::IcomCiv.baud_candidates(), &[19200, 9600, 4800]);
    }

    #[test]
    fn test_plausible_frequency_reply() {
        assert!(Protocol::Kenwood.is_plausible_frequency_reply(b"FA014074000;"));
        assert!(!Protocol::Kenwood.is_plausible_frequency_reply(b"FA0140;"));
        assert!(Protocol::Yaesu.is_plausible_frequency_reply(&[0x01, 0x40, 0x74, 0x00, 0x01]));
        assert!(!Protocol::Yaesu.is_plausible_frequency_reply(&[0x01, 0x40]));
        assert!(Protocol::IcomCiv.is_plausible_frequency_reply(&[0xFE, 0xFE, 0xE0, 0x94, 0x03, 0xFD]));
        assert!(!Protocol::IcomCiv.is_plausible_frequency_reply(&[0x00, 0xFE, 0xE0, 0x94, 0x03, 0xFD]));
    }

    #[test]
    fn test_operation_names() {
        let names: Vec<_> = CatOperation::ALL.iter().map(|op| op.name()).collect();
        assert_eq!(names, ["get_frequency", "set_frequency", "get_mode", "set_mode"]);
    }
}
