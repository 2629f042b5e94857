//! CAT Radio Simulation Library
//!
//! This crate provides virtual transceivers for exercising radio links
//! without physical hardware. It includes:
//!
//! - **VirtualRadio**: answers Kenwood, Yaesu and CI-V commands the way a
//!   registry model would, at a single baud rate
//! - **VirtualOpener**: a [`cat_serial::PortOpener`] whose ports lead to a
//!   virtual radio
//!
//! # Example
//!
//! ```rust
//! use cat_sim::{RadioHandle, VirtualRadio};
//!
//! let radio = RadioHandle::new(VirtualRadio::new("Kenwood TS-590").unwrap());
//!
//! // Answer a frequency query at the radio's baud rate
//! let mut input = b"FA;".to_vec();
//! let reply = radio.lock().process(&mut input, 115200);
//! assert_eq!(reply, b"FA014250000;");
//!
//! // Turn the knob
//! radio.lock().set_frequency(7_074_000);
//! ```

pub mod error;
pub mod opener;
pub mod radio;
pub mod radio_task;

pub use error::SimError;
pub use opener::{VirtualOpener, VirtualPort};
pub use radio::{RadioHandle, VirtualRadio, VirtualRadioConfig};
pub use radio_task::run_virtual_radio_task;
