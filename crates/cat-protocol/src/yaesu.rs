//! Yaesu CAT Protocol Implementation
//!
//! The Yaesu CAT protocol uses 5-byte binary commands.
//!
//! # Command Format
//! ```text
//! [P1] [P2] [P3] [P4] [CMD]
//! ```
//!
//! - Bytes 0-3: Parameters (meaning depends on command)
//! - Byte 4: Command opcode
//!
//! # Frequency Encoding
//! Frequencies are BCD encoded in bytes 0-3 (big-endian) with 10 Hz
//! resolution. Example: 14.250.00 MHz = 0x01 0x42 0x50 0x00
//!
//! The status reply to `00 00 00 00 03` carries the frequency in bytes 0-3
//! and the mode code in byte 4.

use crate::error::{ParseError, ProtocolError};
use crate::{normalize_mode, UNKNOWN_MODE};

/// Standard Yaesu command length
pub const COMMAND_LEN: usize = 5;

/// Read frequency and mode opcode
pub const OP_READ_STATUS: u8 = 0x03;

/// Set frequency opcode (P1-P4 = BCD freq)
pub const OP_SET_FREQUENCY: u8 = 0x01;

/// Set mode opcode (P1 = mode)
pub const OP_SET_MODE: u8 = 0x07;

/// Status (frequency + mode) query
pub const READ_STATUS: [u8; COMMAND_LEN] = [0x00, 0x00, 0x00, 0x00, OP_READ_STATUS];

/// Upper bound on bytes read for a status reply
pub const STATUS_READ_LEN: usize = 28;

/// Largest frequency 8 BCD digits of 10 Hz can carry
pub const MAX_FREQUENCY_HZ: u64 = 999_999_990;

/// Mode code table (byte 4 of the status reply, P1 of set-mode)
pub static MODES: &[(u8, &str)] = &[
    (0x01, "LSB"),
    (0x02, "USB"),
    (0x03, "CW"),
    (0x04, "FM"),
    (0x05, "AM"),
    (0x06, "RTTY-LSB"),
    (0x07, "CW-R"),
    (0x08, "PKT-LSB"),
    (0x09, "RTTY-USB"),
    (0x0A, "PKT-FM"),
    (0x0B, "FM-N"),
    (0x0C, "PKT-USB"),
    (0x0D, "AM-N"),
    (0x82, "C4FM"),
];

/// A parsed 5-byte command, as seen from the radio side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YaesuCommand {
    /// Read frequency and mode
    ReadStatus,
    /// Set frequency (Hz, 10 Hz resolution)
    SetFrequency { hz: u64 },
    /// Set operating mode
    SetMode { code: u8 },
    /// Any other opcode
    Other(u8),
}

impl YaesuCommand {
    /// Parse a complete 5-byte command
    pub fn parse(bytes: &[u8; COMMAND_LEN]) -> Self {
        match bytes[4] {
            OP_READ_STATUS => YaesuCommand::ReadStatus,
            OP_SET_FREQUENCY => match bcd_to_frequency_be(&bytes[..4]) {
                Ok(hz) => YaesuCommand::SetFrequency { hz },
                Err(_) => YaesuCommand::Other(OP_SET_FREQUENCY),
            },
            OP_SET_MODE => YaesuCommand::SetMode { code: bytes[0] },
            other => YaesuCommand::Other(other),
        }
    }
}

/// Look up the mode name for a code, or [`UNKNOWN_MODE`]
pub fn mode_name(code: u8) -> &'static str {
    MODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN_MODE)
}

/// Look up the code for a mode name (trimmed, case-insensitive)
pub fn mode_code(mode: &str) -> Option<u8> {
    let wanted = normalize_mode(mode);
    MODES
        .iter()
        .find(|(_, name)| *name == wanted)
        .map(|(code, _)| *code)
}

/// Decode 4 big-endian BCD bytes (10 Hz units) into Hz
pub fn bcd_to_frequency_be(bytes: &[u8]) -> Result<u64, ParseError> {
    if bytes.len() < 4 {
        return Err(ParseError::TooShort {
            needed: 4,
            got: bytes.len(),
        });
    }

    let mut freq: u64 = 0;
    for &byte in bytes.iter().take(4) {
        let high = (byte >> 4) & 0x0F;
        let low = byte & 0x0F;
        if high > 9 || low > 9 {
            return Err(ParseError::InvalidBcd(byte));
        }
        freq = freq * 100 + u64::from(high) * 10 + u64::from(low);
    }

    Ok(freq * 10)
}

/// Encode Hz into 4 big-endian BCD bytes (10 Hz units, truncating)
pub fn frequency_to_bcd_be(hz: u64) -> [u8; 4] {
    let mut remaining = hz / 10;
    let mut result = [0u8; 4];

    for slot in result.iter_mut().rev() {
        let low = (remaining % 10) as u8;
        remaining /= 10;
        let high = (remaining % 10) as u8;
        remaining /= 10;
        *slot = (high << 4) | low;
    }

    result
}

/// Decode the frequency from a status reply
pub fn decode_frequency(response: &[u8]) -> Result<u64, ParseError> {
    check_status_len(response)?;
    bcd_to_frequency_be(&response[..4])
}

/// Decode the mode from a status reply (byte 4)
pub fn decode_mode(response: &[u8]) -> Result<&'static str, ParseError> {
    check_status_len(response)?;
    Ok(mode_name(response[4]))
}

fn check_status_len(response: &[u8]) -> Result<(), ParseError> {
    match response.len() {
        0 => Err(ParseError::Empty),
        n if n < COMMAND_LEN => Err(ParseError::TooShort {
            needed: COMMAND_LEN,
            got: n,
        }),
        _ => Ok(()),
    }
}

/// Encode a set-frequency command
pub fn encode_set_frequency(hz: u64) -> Result<[u8; COMMAND_LEN], ProtocolError> {
    if hz > MAX_FREQUENCY_HZ {
        return Err(ProtocolError::FrequencyOutOfRange {
            hz,
            protocol: "Yaesu CAT",
        });
    }
    let bcd = frequency_to_bcd_be(hz);
    Ok([bcd[0], bcd[1], bcd[2], bcd[3], OP_SET_FREQUENCY])
}

/// Encode a set-mode command
pub fn encode_set_mode(mode: &str) -> Result<[u8; COMMAND_LEN], ProtocolError> {
    let code = mode_code(mode).ok_or_else(|| ProtocolError::UnsupportedMode {
        mode: mode.to_string(),
        protocol: "Yaesu CAT",
    })?;
    Ok([code, 0x00, 0x00, 0x00, OP_SET_MODE])
}

/// Encode a status reply as a radio would send it
pub fn encode_status_report(hz: u64, mode_code: u8) -> [u8; COMMAND_LEN] {
    let bcd = frequency_to_bcd_be(hz.min(MAX_FREQUENCY_HZ));
    [bcd[0], bcd[1], bcd[2], bcd[3], mode_code]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_status_query_frame() {
        assert_eq!(READ_STATUS, [0x00, 0x00, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn test_encode_set_frequency() {
        let cmd = encode_set_frequency(14_250_000).unwrap();
        assert_eq!(cmd, [0x01, 0x42, 0x50, 0x00, 0x01]);
    }

    #[test]
    fn test_encode_set_frequency_truncates_to_10hz() {
        let cmd = encode_set_frequency(7_074_005).unwrap();
        assert_eq!(cmd, [0x00, 0x70, 0x74, 0x00, 0x01]);
    }

    #[test]
    fn test_encode_set_frequency_out_of_range() {
        assert!(matches!(
            encode_set_frequency(1_000_000_000),
            Err(ProtocolError::FrequencyOutOfRange { .. })
        ));
    }

    #[test]
    fn test_decode_status_reply() {
        let reply = [0x01, 0x42, 0x50, 0x00, 0x02];
        assert_eq!(decode_frequency(&reply).unwrap(), 14_250_000);
        assert_eq!(decode_mode(&reply).unwrap(), "USB");
    }

    #[test]
    fn test_decode_short_reply() {
        assert_eq!(
            decode_frequency(&[0x01, 0x42]),
            Err(ParseError::TooShort { needed: 5, got: 2 })
        );
        assert_eq!(decode_mode(&[]), Err(ParseError::Empty));
    }

    #[test]
    fn test_decode_invalid_bcd() {
        assert_eq!(
            decode_frequency(&[0x01, 0x4A, 0x50, 0x00, 0x02]),
            Err(ParseError::InvalidBcd(0x4A))
        );
    }

    #[test]
    fn test_unknown_mode_code() {
        assert_eq!(decode_mode(&[0x00, 0x70, 0x74, 0x00, 0x55]).unwrap(), UNKNOWN_MODE);
        assert_eq!(mode_name(0x82), "C4FM");
    }

    #[test]
    fn test_encode_set_mode() {
        assert_eq!(encode_set_mode("pkt-usb").unwrap(), [0x0C, 0, 0, 0, 0x07]);
        assert!(matches!(
            encode_set_mode("DATA-U"),
            Err(ProtocolError::UnsupportedMode { .. })
        ));
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(YaesuCommand::parse(&READ_STATUS), YaesuCommand::ReadStatus);
        assert_eq!(
            YaesuCommand::parse(&[0x01, 0x42, 0x50, 0x00, 0x01]),
            YaesuCommand::SetFrequency { hz: 14_250_000 }
        );
        assert_eq!(
            YaesuCommand::parse(&[0x0C, 0, 0, 0, 0x07]),
            YaesuCommand::SetMode { code: 0x0C }
        );
        assert_eq!(YaesuCommand::parse(&[0, 0, 0, 0, 0x88]), YaesuCommand::Other(0x88));
    }

    proptest! {
        #[test]
        fn bcd_roundtrip_within_10hz(hz in 0u64..=MAX_FREQUENCY_HZ) {
            let cmd = encode_set_frequency(hz).unwrap();
            let back = bcd_to_frequency_be(&cmd[..4]).unwrap();
            prop_assert_eq!(back, hz - hz % 10);
        }
    }
}
