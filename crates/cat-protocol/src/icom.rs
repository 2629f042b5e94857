//! Icom CI-V Protocol Implementation
//!
//! The CI-V (Communication Interface V) protocol is used by Icom transceivers.
//! It uses framed variable-length binary messages with address-based routing.
//!
//! # Frame Format
//! ```text
//! FE FE [to] [from] [cmd] [data...] FD
//! ```
//!
//! - `FE FE`: Preamble (two bytes)
//! - `to`: Destination address (radio address or 0xE0 for controller)
//! - `from`: Source address (controller address, typically 0xE0)
//! - `cmd`: Command code
//! - `data`: Variable length data (BCD encoded for frequencies)
//! - `FD`: Terminator
//!
//! # Frequency Encoding
//! Frequencies are encoded in BCD (Binary Coded Decimal), little-endian.
//! Example: 14.250.000 Hz = 00 00 25 14 00
//!
//! CI-V is a shared bus, so a radio wired through a single-line interface
//! hears its own transmissions: the controller's command comes back as an
//! echo in front of the real reply. [`strip_echo`] removes it.

use crate::error::{ParseError, ProtocolError};
use crate::{normalize_mode, CatOperation, UNKNOWN_MODE};

/// CI-V frame preamble byte
pub const PREAMBLE_BYTE: u8 = 0xFE;
/// CI-V frame preamble (two bytes)
pub const PREAMBLE: [u8; 2] = [PREAMBLE_BYTE, PREAMBLE_BYTE];
/// CI-V frame terminator byte
pub const TERMINATOR: u8 = 0xFD;
/// Default controller address
pub const CONTROLLER_ADDR: u8 = 0xE0;

/// Read operating frequency
pub const CMD_READ_FREQUENCY: u8 = 0x03;
/// Read operating mode
pub const CMD_READ_MODE: u8 = 0x04;
/// Set operating frequency
pub const CMD_SET_FREQUENCY: u8 = 0x05;
/// Set operating mode
pub const CMD_SET_MODE: u8 = 0x06;
/// Positive acknowledgement
pub const ACK: u8 = 0xFB;
/// Negative acknowledgement
pub const NAK: u8 = 0xFA;

/// Filter byte sent with set-mode
pub const DEFAULT_FILTER: u8 = 0x01;

/// Number of BCD bytes in a frequency payload
pub const FREQUENCY_BYTES: usize = 5;

/// Offset of the payload in a frame (after preamble, addresses and command)
const PAYLOAD_OFFSET: usize = 5;

/// Minimum frame: FE FE to from cmd FD
pub const MIN_FRAME_LEN: usize = 6;
/// Shortest reply accepted while probing baud rates
pub const MIN_PROBE_REPLY_LEN: usize = MIN_FRAME_LEN;
/// Shortest frequency reply
pub const MIN_FREQUENCY_REPLY_LEN: usize = 11;
/// Shortest mode reply (mode and filter bytes)
pub const MIN_MODE_REPLY_LEN: usize = 8;

/// Upper bound on bytes read for a frequency reply
pub const FREQUENCY_READ_LEN: usize = 17;
/// Upper bound on bytes read for a mode reply
pub const MODE_READ_LEN: usize = 14;

/// Largest frequency 10 BCD digits can carry
pub const MAX_FREQUENCY_HZ: u64 = 9_999_999_999;

/// Mode code table (byte following the command in mode frames)
pub static MODES: &[(u8, &str)] = &[
    (0x00, "LSB"),
    (0x01, "USB"),
    (0x02, "AM"),
    (0x03, "CW"),
    (0x04, "RTTY"),
    (0x05, "FM"),
    (0x06, "WFM"),
    (0x07, "CW-R"),
    (0x08, "RTTY-R"),
    (0x17, "DATA"),
];

/// A decoded CI-V frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CivFrame {
    /// Destination address
    pub to_addr: u8,
    /// Source address
    pub from_addr: u8,
    /// Command code
    pub command: u8,
    /// Payload between the command byte and the terminator
    pub data: Vec<u8>,
}

impl CivFrame {
    /// Create a frame from the controller to a radio
    pub fn to_radio(radio_addr: u8, command: u8, data: &[u8]) -> Self {
        Self {
            to_addr: radio_addr,
            from_addr: CONTROLLER_ADDR,
            command,
            data: data.to_vec(),
        }
    }

    /// Create a frame from a radio to the controller
    pub fn from_radio(radio_addr: u8, command: u8, data: &[u8]) -> Self {
        Self {
            to_addr: CONTROLLER_ADDR,
            from_addr: radio_addr,
            command,
            data: data.to_vec(),
        }
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(MIN_FRAME_LEN + self.data.len());
        frame.extend_from_slice(&PREAMBLE);
        frame.push(self.to_addr);
        frame.push(self.from_addr);
        frame.push(self.command);
        frame.extend_from_slice(&self.data);
        frame.push(TERMINATOR);
        frame
    }

    /// Parse one complete frame
    pub fn parse(frame: &[u8]) -> Result<Self, ParseError> {
        if frame.len() < MIN_FRAME_LEN {
            return Err(ParseError::TooShort {
                needed: MIN_FRAME_LEN,
                got: frame.len(),
            });
        }
        if !frame.starts_with(&PREAMBLE) {
            return Err(ParseError::InvalidFrame("missing preamble".into()));
        }
        if frame[frame.len() - 1] != TERMINATOR {
            return Err(ParseError::InvalidFrame("missing terminator".into()));
        }

        Ok(Self {
            to_addr: frame[2],
            from_addr: frame[3],
            command: frame[4],
            data: frame[PAYLOAD_OFFSET..frame.len() - 1].to_vec(),
        })
    }
}

/// Split a byte stream into complete frames, skipping leading noise
pub fn split_frames(buffer: &[u8]) -> Vec<&[u8]> {
    let mut frames = Vec::new();
    let mut rest = buffer;

    while let Some(start) = rest.windows(2).position(|w| w == PREAMBLE) {
        // Collapse runs of extra preamble bytes
        let mut begin = start;
        while rest.get(begin + 2) == Some(&PREAMBLE_BYTE) {
            begin += 1;
        }
        match rest[begin..].iter().position(|&b| b == TERMINATOR) {
            Some(end) => {
                frames.push(&rest[begin..begin + end + 1]);
                rest = &rest[begin + end + 1..];
            }
            None => break,
        }
    }

    frames
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

/// Convert BCD-encoded bytes to frequency in Hz
/// CI-V uses little-endian BCD (least significant digit first)
pub fn bcd_to_frequency(data: &[u8]) -> Result<u64, ParseError> {
    let mut freq: u64 = 0;
    let mut multiplier: u64 = 1;

    for &byte in data {
        let low = (byte & 0x0F) as u64;
        let high = ((byte >> 4) & 0x0F) as u64;

        if low > 9 || high > 9 {
            return Err(ParseError::InvalidBcd(byte));
        }

        freq += low * multiplier;
        multiplier *= 10;
        freq += high * multiplier;
        multiplier *= 10;
    }

    Ok(freq)
}

/// Convert frequency in Hz to BCD-encoded bytes
/// Returns 5 bytes (10 BCD digits), little-endian
pub fn frequency_to_bcd(hz: u64) -> [u8; FREQUENCY_BYTES] {
    let mut result = [0u8; FREQUENCY_BYTES];
    let mut remaining = hz;

    for slot in result.iter_mut() {
        let low = (remaining % 10) as u8;
        remaining /= 10;
        let high = (remaining % 10) as u8;
        remaining /= 10;
        *slot = (high << 4) | low;
    }

    result
}

/// Read-frequency query for a radio address
pub fn encode_read_frequency(radio_addr: u8) -> Vec<u8> {
    CivFrame::to_radio(radio_addr, CMD_READ_FREQUENCY, &[]).encode()
}

/// Read-mode query for a radio address
pub fn encode_read_mode(radio_addr: u8) -> Vec<u8> {
    CivFrame::to_radio(radio_addr, CMD_READ_MODE, &[]).encode()
}

/// Set-frequency command for a radio address
pub fn encode_set_frequency(radio_addr: u8, hz: u64) -> Result<Vec<u8>, ProtocolError> {
    if hz > MAX_FREQUENCY_HZ {
        return Err(ProtocolError::FrequencyOutOfRange {
            hz,
            protocol: "Icom CI-V",
        });
    }
    Ok(CivFrame::to_radio(radio_addr, CMD_SET_FREQUENCY, &frequency_to_bcd(hz)).encode())
}

/// Set-mode command (mode byte plus default filter) for a radio address
pub fn encode_set_mode(radio_addr: u8, mode: &str) -> Result<Vec<u8>, ProtocolError> {
    let code = mode_code(mode).ok_or_else(|| ProtocolError::UnsupportedMode {
        mode: mode.to_string(),
        protocol: "Icom CI-V",
    })?;
    Ok(CivFrame::to_radio(radio_addr, CMD_SET_MODE, &[code, DEFAULT_FILTER]).encode())
}

/// Frequency reply as a radio would send it
pub fn encode_frequency_report(radio_addr: u8, hz: u64) -> Vec<u8> {
    CivFrame::from_radio(radio_addr, CMD_READ_FREQUENCY, &frequency_to_bcd(hz)).encode()
}

/// Mode reply as a radio would send it
pub fn encode_mode_report(radio_addr: u8, code: u8, filter: u8) -> Vec<u8> {
    CivFrame::from_radio(radio_addr, CMD_READ_MODE, &[code, filter]).encode()
}

/// Acknowledgement frame (`FB` or `FA`) as a radio would send it
pub fn encode_ack(radio_addr: u8, ok: bool) -> Vec<u8> {
    CivFrame::from_radio(radio_addr, if ok { ACK } else { NAK }, &[]).encode()
}

/// Remove a leading echo of `sent` from a reply buffer
pub fn strip_echo<'a>(sent: &[u8], response: &'a [u8]) -> &'a [u8] {
    if !sent.is_empty() && response.starts_with(sent) {
        &response[sent.len()..]
    } else {
        response
    }
}

/// Whether `frame` is the radio's answer to `op` (or a rejection of it)
fn is_reply_to(op: CatOperation, frame: &[u8]) -> bool {
    if frame.len() < MIN_FRAME_LEN || frame[2] != CONTROLLER_ADDR {
        return false;
    }
    match op {
        CatOperation::GetFrequency => frame[4] == CMD_READ_FREQUENCY || frame[4] == NAK,
        CatOperation::GetMode => frame[4] == CMD_READ_MODE || frame[4] == NAK,
        CatOperation::SetFrequency | CatOperation::SetMode => frame[4] == ACK || frame[4] == NAK,
    }
}

/// Whether `buffer` holds a terminated reply frame addressed to the controller
///
/// Echoes of our own commands are addressed to the radio, so they never
/// complete a read on their own.
pub fn reply_complete(op: CatOperation, buffer: &[u8]) -> bool {
    split_frames(buffer)
        .into_iter()
        .any(|frame| is_reply_to(op, frame))
}

/// Locate the radio's reply to `op` in a read buffer
///
/// Skips the echo of `sent` and any unrelated frames (late acknowledgements,
/// transceive broadcasts). When no frame matches, the buffer is returned
/// with only the echo removed so the decoder can report what is wrong.
pub fn reply_frame<'a>(op: CatOperation, sent: &[u8], buffer: &'a [u8]) -> &'a [u8] {
    let rest = strip_echo(sent, buffer);
    split_frames(rest)
        .into_iter()
        .find(|frame| is_reply_to(op, frame))
        .unwrap_or(rest)
}

fn check_reply(response: &[u8], min_len: usize) -> Result<(), ParseError> {
    if response.is_empty() {
        return Err(ParseError::Empty);
    }
    if !response.starts_with(&PREAMBLE) {
        return Err(ParseError::InvalidFrame(format!(
            "missing preamble: {:02X?}",
            &response[..response.len().min(4)]
        )));
    }
    if response.len() < min_len {
        return Err(ParseError::TooShort {
            needed: min_len,
            got: response.len(),
        });
    }
    if response[4] == NAK {
        return Err(ParseError::InvalidFrame("radio rejected command (NG)".into()));
    }
    Ok(())
}

/// Decode a frequency reply (echo already stripped)
pub fn decode_frequency(response: &[u8]) -> Result<u64, ParseError> {
    check_reply(response, MIN_FREQUENCY_REPLY_LEN)?;
    bcd_to_frequency(&response[PAYLOAD_OFFSET..PAYLOAD_OFFSET + FREQUENCY_BYTES])
}

/// Decode a mode reply (echo already stripped)
///
/// Codes missing from [`MODES`] decode to [`UNKNOWN_MODE`].
pub fn decode_mode(response: &[u8]) -> Result<&'static str, ParseError> {
    check_reply(response, MIN_MODE_REPLY_LEN)?;
    Ok(mode_name(response[PAYLOAD_OFFSET]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bcd_to_frequency() {
        // 14.250.000 Hz
        let bcd = [0x00, 0x00, 0x25, 0x14, 0x00];
        assert_eq!(bcd_to_frequency(&bcd).unwrap(), 14_250_000);

        // 7.074.000 Hz
        let bcd = [0x00, 0x40, 0x07, 0x07, 0x00];
        assert_eq!(bcd_to_frequency(&bcd).unwrap(), 7_074_000);
    }

    #[test]
    fn test_frequency_to_bcd() {
        assert_eq!(frequency_to_bcd(14_250_000), [0x00, 0x00, 0x25, 0x14, 0x00]);
    }

    #[test]
    fn test_query_frames_use_model_address() {
        assert_eq!(encode_read_frequency(0x94), [0xFE, 0xFE, 0x94, 0xE0, 0x03, 0xFD]);
        assert_eq!(encode_read_mode(0xA4), [0xFE, 0xFE, 0xA4, 0xE0, 0x04, 0xFD]);
    }

    #[test]
    fn test_encode_set_frequency() {
        let cmd = encode_set_frequency(0x94, 14_250_000).unwrap();
        assert_eq!(
            cmd,
            [0xFE, 0xFE, 0x94, 0xE0, 0x05, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD]
        );
    }

    #[test]
    fn test_encode_set_mode() {
        assert_eq!(
            encode_set_mode(0xA2, "cw-r").unwrap(),
            [0xFE, 0xFE, 0xA2, 0xE0, 0x06, 0x07, 0x01, 0xFD]
        );
        assert!(matches!(
            encode_set_mode(0xA2, "PKT-USB"),
            Err(ProtocolError::UnsupportedMode { .. })
        ));
    }

    #[test]
    fn test_decode_frequency_reply() {
        let reply = encode_frequency_report(0x94, 14_074_000);
        assert_eq!(reply.len(), MIN_FREQUENCY_REPLY_LEN);
        assert_eq!(decode_frequency(&reply).unwrap(), 14_074_000);
    }

    #[test]
    fn test_decode_after_echo() {
        let sent = encode_read_frequency(0x94);
        let mut buffer = sent.clone();
        buffer.extend(encode_frequency_report(0x94, 7_200_000));

        assert_eq!(decode_frequency(strip_echo(&sent, &buffer)).unwrap(), 7_200_000);
    }

    #[test]
    fn test_decode_rejects_missing_preamble() {
        let reply = [0x00, 0xFE, 0xE0, 0x94, 0x03, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD];
        assert!(matches!(decode_frequency(&reply), Err(ParseError::InvalidFrame(_))));
    }

    #[test]
    fn test_decode_rejects_nak() {
        let mut reply = encode_ack(0x94, false);
        reply.extend([0x00, 0x00]);
        assert!(decode_mode(&reply).is_err());
    }

    #[test]
    fn test_decode_mode_reply() {
        assert_eq!(decode_mode(&encode_mode_report(0x94, 0x17, 0x01)).unwrap(), "DATA");
        assert_eq!(decode_mode(&encode_mode_report(0x94, 0x42, 0x01)).unwrap(), UNKNOWN_MODE);
        assert!(matches!(
            decode_mode(&[0xFE, 0xFE, 0xE0, 0x94, 0x04, 0xFD]),
            Err(ParseError::TooShort { .. })
        ));
    }

    #[test]
    fn test_reply_complete_ignores_echo() {
        let sent = encode_read_frequency(0x94);
        assert!(!reply_complete(CatOperation::GetFrequency, &sent));

        let mut buffer = sent.clone();
        buffer.extend(&encode_frequency_report(0x94, 14_000_000)[..6]);
        assert!(!reply_complete(CatOperation::GetFrequency, &buffer));

        buffer = sent;
        buffer.extend(encode_frequency_report(0x94, 14_000_000));
        assert!(reply_complete(CatOperation::GetFrequency, &buffer));
    }

    #[test]
    fn test_reply_frame_skips_stale_ack() {
        let sent = encode_read_mode(0x94);
        let mut buffer = encode_ack(0x94, true);
        buffer.extend(&sent);
        buffer.extend(encode_mode_report(0x94, 0x01, 0x02));

        let frame = reply_frame(CatOperation::GetMode, &sent, &buffer);
        assert_eq!(decode_mode(frame).unwrap(), "USB");
    }

    #[test]
    fn test_reply_frame_falls_back_to_unechoed_buffer() {
        let sent = encode_read_frequency(0x94);
        let mut buffer = sent.clone();
        buffer.extend([0xFE, 0xFE, 0xE0]);

        let frame = reply_frame(CatOperation::GetFrequency, &sent, &buffer);
        assert_eq!(frame, &[0xFE, 0xFE, 0xE0]);
        assert!(decode_frequency(frame).is_err());
    }

    #[test]
    fn test_set_replies_are_acks() {
        assert!(reply_complete(CatOperation::SetFrequency, &encode_ack(0x94, true)));
        assert!(reply_complete(CatOperation::SetMode, &encode_ack(0x94, false)));
        assert!(!reply_complete(CatOperation::SetMode, &encode_mode_report(0x94, 1, 1)));
    }

    #[test]
    fn test_frame_parse() {
        let bytes = encode_set_mode(0x94, "USB").unwrap();
        let frame = CivFrame::parse(&bytes).unwrap();
        assert_eq!(frame.to_addr, 0x94);
        assert_eq!(frame.from_addr, CONTROLLER_ADDR);
        assert_eq!(frame.command, CMD_SET_MODE);
        assert_eq!(frame.data, vec![0x01, 0x01]);
    }

    #[test]
    fn test_split_frames_skips_noise() {
        let mut stream = vec![0x00, 0x13];
        stream.extend(encode_read_frequency(0x94));
        stream.extend(encode_read_mode(0x94));
        stream.extend([0xFE, 0xFE, 0x94]);
        let frames = split_frames(&stream);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], encode_read_mode(0x94).as_slice());
    }

    proptest! {
        #[test]
        fn bcd_roundtrip_exact(hz in 0u64..=MAX_FREQUENCY_HZ) {
            prop_assert_eq!(bcd_to_frequency(&frequency_to_bcd(hz)).unwrap(), hz);
        }
    }
}
