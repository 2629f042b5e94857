//! CAT Radio Link
//!
//! This crate drives a single transceiver over a serial CAT connection:
//! it opens the port, proves the radio is there, and then reads and sets
//! frequency and mode on request or on a polling interval.
//!
//! # Architecture
//!
//! - [`RadioLink`] owns the connection behind one async lock. Every
//!   exchange (a set plus its read-back, the poller's reads) holds the lock
//!   for its whole duration, so commands never interleave on the wire.
//! - Each call looks up the protocol for its operation on the connected
//!   [`RadioModel`](cat_protocol::RadioModel), so radios that mix command
//!   sets are driven with the right codec per operation.
//! - State changes are broadcast as [`LinkEvent`]s.
//! - Repeated failed exchanges close the link; any success resets the count.
//!
//! # Example
//!
//! ```rust,no_run
//! use cat_link::{LinkConfig, RadioLink};
//!
//! # async fn example() -> Result<(), cat_link::LinkError> {
//! let link = RadioLink::new(LinkConfig::default());
//! let hz = link.connect("/dev/ttyUSB0", "Icom IC-7300", None).await?;
//! println!("Radio is on {} Hz", hz);
//!
//! link.set_mode("SSB").await?;
//! link.start_polling(None);
//! # Ok(())
//! # }
//! ```

mod connection;

pub mod config;
pub mod error;
pub mod events;
pub mod link;

pub use config::LinkConfig;
pub use connection::VERIFY_TOLERANCE_HZ;
pub use error::LinkError;
pub use events::LinkEvent;
pub use link::RadioLink;
