//! Kenwood CAT Protocol Implementation
//!
//! The Kenwood protocol uses ASCII semicolon-terminated commands.
//! Commands are human-readable with 2-letter command prefixes. Many
//! non-Kenwood radios (the Yaesu FT-DX series among them) accept the same
//! command set.
//!
//! # Format
//! - Commands: `XXppppp;` where XX is command code, ppppp is parameters
//! - Responses: Same format as commands
//! - Terminator: `;` (0x3B)
//!
//! # Commands used here
//! - `FA;` / `FA000000000;` - read / set VFO A frequency (9-digit Hz field)
//! - `IF;` - information (status) query, carries the mode code
//! - `MDcc;` - set mode

use crate::error::{ParseError, ProtocolError};
use crate::{normalize_mode, UNKNOWN_MODE};

/// Command terminator
pub const TERMINATOR: u8 = b';';

/// Read VFO A frequency
pub const READ_FREQUENCY: &[u8] = b"FA;";

/// Read information/status block
pub const READ_INFO: &[u8] = b"IF;";

/// Upper bound on bytes read for a reply
pub const MAX_REPLY_LEN: usize = 128;

/// Width of the frequency field in a set-frequency command
pub const FREQUENCY_DIGITS: usize = 9;

/// Minimum digits a frequency reply must carry
pub const MIN_FREQUENCY_DIGITS: usize = 8;

/// Minimum length of an `IF` reply
pub const MIN_INFO_LEN: usize = 21;

/// Offset of the 2-character mode code inside an `IF` reply
const MODE_OFFSET: usize = 20;

/// Largest frequency the 9-digit field can carry
const MAX_FREQUENCY_HZ: u64 = 999_999_999;

/// Mode code table (code as found in `IF` replies and `MD` commands)
pub static MODES: &[(&str, &str)] = &[
    ("01", "LSB"),
    ("02", "USB"),
    ("03", "CW-U"),
    ("04", "FM"),
    ("05", "AM"),
    ("06", "RTTY-L"),
    ("07", "CW-L"),
    ("08", "DATA-L"),
    ("09", "RTTY-U"),
    ("10", "PSK"),
    ("0C", "DATA-U"),
];

/// Look up the mode name for a code, or [`UNKNOWN_MODE`]
pub fn mode_name(code: &str) -> &'static str {
    MODES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN_MODE)
}

/// Look up the code for a mode name (trimmed, case-insensitive)
pub fn mode_code(mode: &str) -> Option<&'static str> {
    let wanted = normalize_mode(mode);
    MODES
        .iter()
        .find(|(_, name)| *name == wanted)
        .map(|(code, _)| *code)
}

/// Whether a reply buffer holds at least one terminated command
pub fn reply_complete(buffer: &[u8]) -> bool {
    buffer.contains(&TERMINATOR)
}

/// Count ASCII digits in a reply
pub fn digit_count(response: &[u8]) -> usize {
    response.iter().filter(|b| b.is_ascii_digit()).count()
}

/// Decode a frequency reply (`FA014250000;`) into Hz
///
/// The digits are read as whole Hz, not 100 Hz units: `FA014250000;` is
/// 14.25 MHz, and so is an 11-digit `FA00014250000;`.
///
/// Every ASCII digit in the reply is used and anything else is ignored, so
/// stray framing bytes do not break decoding. At least
/// [`MIN_FREQUENCY_DIGITS`] digits are required.
pub fn decode_frequency(response: &[u8]) -> Result<u64, ParseError> {
    if response.is_empty() {
        return Err(ParseError::Empty);
    }

    let digits: String = response
        .iter()
        .filter(|b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();

    if digits.len() < MIN_FREQUENCY_DIGITS {
        return Err(ParseError::InvalidFrequency(format!(
            "only {} digits in {:?}",
            digits.len(),
            String::from_utf8_lossy(response)
        )));
    }

    digits
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidFrequency(digits))
}

/// Encode a set-frequency command with a fixed 9-digit field
pub fn encode_set_frequency(hz: u64) -> Result<Vec<u8>, ProtocolError> {
    if hz > MAX_FREQUENCY_HZ {
        return Err(ProtocolError::FrequencyOutOfRange {
            hz,
            protocol: "Kenwood",
        });
    }
    Ok(format!("FA{:0width$};", hz, width = FREQUENCY_DIGITS).into_bytes())
}

/// Encode a frequency report as a radio would send it
pub fn encode_frequency_report(hz: u64) -> Vec<u8> {
    format!("FA{:0width$};", hz, width = FREQUENCY_DIGITS).into_bytes()
}

/// Encode an `IF` status reply carrying a frequency and mode code
pub fn encode_info_report(hz: u64, mode_code: &str) -> Vec<u8> {
    format!("IF001{:09}+00000{:0>2}0000;", hz % 1_000_000_000, mode_code).into_bytes()
}

/// Decode the mode from an `IF` reply
///
/// Codes missing from [`MODES`] decode to [`UNKNOWN_MODE`].
pub fn decode_mode(response: &[u8]) -> Result<&'static str, ParseError> {
    if response.is_empty() {
        return Err(ParseError::Empty);
    }

    let text = String::from_utf8_lossy(response);
    if text.len() < MIN_INFO_LEN {
        return Err(ParseError::TooShort {
            needed: MIN_INFO_LEN,
            got: text.len(),
        });
    }
    if !text.starts_with("IF") {
        return Err(ParseError::InvalidFrame(format!(
            "expected IF reply, got {:?}",
            text.chars().take(10).collect::<String>()
        )));
    }

    let code = text
        .get(MODE_OFFSET..MODE_OFFSET + 2)
        .ok_or(ParseError::TooShort {
            needed: MODE_OFFSET + 2,
            got: text.len(),
        })?;

    Ok(mode_name(code))
}

/// Encode a set-mode command (`MD02;`)
pub fn encode_set_mode(mode: &str) -> Result<Vec<u8>, ProtocolError> {
    let code = mode_code(mode).ok_or_else(|| ProtocolError::UnsupportedMode {
        mode: mode.to_string(),
        protocol: "Kenwood",
    })?;
    Ok(format!("MD{};", code).into_bytes())
}

/// Parse a set-mode command back into its code (used by simulators)
pub fn parse_set_mode(command: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(command).ok()?;
    let code = text.strip_prefix("MD")?.strip_suffix(';')?;
    (code.len() == 2).then(|| code.to_ascii_uppercase())
}

/// Parse a set-frequency command back into Hz (used by simulators)
pub fn parse_set_frequency(command: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(command).ok()?;
    let digits = text.strip_prefix("FA")?.strip_suffix(';')?;
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
