//! Notifications emitted by a radio link
//!
//! Every observer gets its own receiver from
//! [`RadioLink::subscribe`](crate::RadioLink::subscribe). A receiver that
//! falls behind sees `RecvError::Lagged` and keeps going from the newest event.

/// Event broadcast by a [`RadioLink`](crate::RadioLink)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link connected (`true`) or was closed (`false`)
    ///
    /// `false` is sent on every disconnect call, including redundant ones,
    /// and when the link gives up after repeated failures.
    ConnectionChanged(bool),

    /// The cached frequency changed, in Hz
    FrequencyChanged(u64),

    /// The cached mode changed, as named by the radio's mode table
    ModeChanged(String),
}
