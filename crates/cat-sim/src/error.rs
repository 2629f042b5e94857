//! Error types for the simulator

use thiserror::Error;

/// Errors raised while building virtual radios
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Model name not in the registry
    #[error("no radio model named {0:?}")]
    UnknownModel(String),
}
