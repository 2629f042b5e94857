//! Error types for serial access and baud detection

use thiserror::Error;

/// Errors that can occur during port enumeration and detection
#[derive(Debug, Error)]
pub enum DetectError {
    /// Model name not in the registry
    #[error("unsupported radio model: {0}")]
    UnsupportedModel(String),

    /// Failed to open serial port
    #[error("failed to open port {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Timeout waiting for response
    #[error("timeout probing {port} at {baud} baud")]
    Timeout { port: String, baud: u32 },

    /// Reply did not look like a frequency report
    #[error("implausible reply on {port} at {baud} baud: {reply:02X?}")]
    Implausible { port: String, baud: u32, reply: Vec<u8> },

    /// I/O error during probe
    #[error("I/O error on {port}: {reason}")]
    IoError { port: String, reason: String },

    /// Serial port error
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),
}
