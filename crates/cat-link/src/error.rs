//! Error types for the radio link

use cat_protocol::{CatOperation, ParseError, ProtocolError};
use thiserror::Error;

/// Errors returned by [`RadioLink`](crate::RadioLink) operations
#[derive(Debug, Error)]
pub enum LinkError {
    /// Model name is not in the registry
    #[error("unsupported radio model: {0}")]
    UnsupportedModel(String),

    /// No port name given
    #[error("no serial port selected")]
    MissingPort,

    /// Operation needs a connected radio
    #[error("radio not connected")]
    NotConnected,

    /// The port could not be opened
    #[error("failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    /// I/O error on an open port
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Nothing came back before the read or write deadline
    #[error("timed out waiting for {0}")]
    Timeout(CatOperation),

    /// The connect probe did not produce a usable frequency
    #[error("no response from {model} on {port} at {baud} baud: {reason}")]
    NoResponse {
        model: String,
        port: String,
        baud: u32,
        reason: String,
    },

    /// Reply could not be decoded, or the command could not be encoded
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    /// Read-back after a set did not match what was written
    #[error("verification failed: expected {expected}, radio reports {actual}")]
    VerificationFailed { expected: String, actual: String },

    /// Mode name has no code in the protocol used for setting modes
    #[error("mode {mode:?} not supported by {protocol}")]
    UnknownMode { mode: String, protocol: &'static str },
}

impl LinkError {
    /// Whether this error means an exchange with the radio went wrong
    ///
    /// Only these count towards the consecutive-failure limit. Rejections
    /// before any I/O and read-back mismatches (the radio did answer) do not.
    pub fn is_exchange_failure(&self) -> bool {
        match self {
            LinkError::Io(_) | LinkError::Timeout(_) => true,
            LinkError::Protocol(ProtocolError::Parse(_))
            | LinkError::Protocol(ProtocolError::InvalidResponse(_)) => true,
            _ => false,
        }
    }
}

impl From<ProtocolError> for LinkError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnsupportedMode { mode, protocol } => {
                LinkError::UnknownMode { mode, protocol }
            }
            other => LinkError::Protocol(other),
        }
    }
}

impl From<ParseError> for LinkError {
    fn from(err: ParseError) -> Self {
        LinkError::Protocol(ProtocolError::Parse(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_mode_becomes_unknown_mode() {
        let err: LinkError = ProtocolError::UnsupportedMode {
            mode: "C4FM".into(),
            protocol: "Kenwood",
        }
        .into();
        assert!(matches!(err, LinkError::UnknownMode { ref mode, .. } if mode == "C4FM"));
        assert!(!err.is_exchange_failure());
    }

    #[test]
    fn test_failure_classification() {
        assert!(LinkError::from(ParseError::Empty).is_exchange_failure());
        assert!(LinkError::Timeout(CatOperation::GetMode).is_exchange_failure());
        assert!(!LinkError::VerificationFailed {
            expected: "USB".into(),
            actual: "LSB".into()
        }
        .is_exchange_failure());
        assert!(!LinkError::from(ProtocolError::FrequencyOutOfRange {
            hz: 1_000_000_000,
            protocol: "Kenwood"
        })
        .is_exchange_failure());
    }
}
