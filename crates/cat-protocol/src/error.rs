//! Error types for CAT protocol parsing and encoding

use thiserror::Error;

/// Errors that can occur while parsing protocol data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No bytes came back from the radio
    #[error("empty response")]
    Empty,

    /// Response shorter than the protocol minimum
    #[error("short response: need {needed} bytes, got {got}")]
    TooShort { needed: usize, got: usize },

    /// Invalid frame structure
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Invalid BCD encoding
    #[error("invalid BCD digit: 0x{0:02X}")]
    InvalidBcd(u8),

    /// Invalid frequency value
    #[error("invalid frequency: {0}")]
    InvalidFrequency(String),

    /// Mode name has no code in the protocol's mode table
    #[error("invalid mode: {0}")]
    InvalidMode(String),
}

/// Higher-level protocol errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Parse error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Frequency cannot be represented in the protocol's field
    #[error("frequency {hz} Hz out of range for {protocol}")]
    FrequencyOutOfRange { hz: u64, protocol: &'static str },

    /// Mode name not supported by the protocol
    #[error("mode {mode:?} not supported by {protocol}")]
    UnsupportedMode { mode: String, protocol: &'static str },

    /// Invalid response from radio
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
