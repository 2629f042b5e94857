//! CAT Serial Transport Library
//!
//! This crate owns everything between a radio link and the operating
//! system's serial ports:
//!
//! - [`transport`]: the [`CatTransport`] abstraction with its line
//!   discipline (8N1, no flow control, timeouts, DTR/RTS rule) and the
//!   [`PortOpener`] seam used to swap real hardware for virtual radios
//! - [`scanner`]: serial port enumeration, radios ranked first
//! - [`baud`]: baud-rate auto-detection for a known radio model
//!
//! # Example
//!
//! ```rust,no_run
//! use cat_serial::{detect_baud_rate, DetectConfig, PortScanner, SerialOpener};
//!
//! # async fn run() -> Result<(), cat_serial::DetectError> {
//! let scanner = PortScanner::new();
//! for port in scanner.enumerate_ports()? {
//!     let baud = detect_baud_rate(&SerialOpener, &port.port, "Icom IC-7300", &DetectConfig::default()).await?;
//!     println!("{}: {:?}", port.port, baud);
//! }
//! # Ok(())
//! # }
//! ```

pub mod baud;
pub mod error;
pub mod scanner;
pub mod transport;

pub use baud::{detect_baud_rate, DetectConfig};
pub use error::DetectError;
pub use scanner::{PortKind, PortScanner, SerialPortInfo};
pub use transport::{
    apply_control_lines, read_reply, write_command, CatTransport, PortOpener, PortSettings,
    SerialOpener,
};
