//! Link configuration

use std::time::Duration;

use cat_protocol::CwHandling;
use serde::{Deserialize, Serialize};

/// Timing and policy knobs for a [`RadioLink`](crate::RadioLink)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Bound on waiting for a reply
    pub read_timeout: Duration,
    /// Bound on writing and flushing a command
    pub write_timeout: Duration,
    /// Pause after opening the port and between a write and its read
    pub settle: Duration,
    /// Interval between polls when polling is started without one
    pub poll_interval: Duration,
    /// How `set_mode` treats a bare `CW`
    pub cw_handling: CwHandling,
    /// Failed exchanges in a row before the link drops the radio (0 never drops it)
    pub max_consecutive_failures: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(2),
            settle: Duration::from_millis(50),
            poll_interval: Duration::from_secs(2),
            cw_handling: CwHandling::PassThrough,
            max_consecutive_failures: 5,
        }
    }
}
