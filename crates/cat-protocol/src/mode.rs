//! Semantic mode resolution
//!
//! Operators think in terms of "SSB", "FT8" or "CW"; radios want a concrete
//! sideband designation. Below 10 MHz amateur convention is lower sideband,
//! at and above it upper sideband.

use tracing::trace;

use crate::{normalize_mode, Protocol};

/// Frequencies below this use the lower sideband designation
pub const SIDEBAND_THRESHOLD_HZ: u64 = 10_000_000;

/// Digital modes that ride on a data sideband
pub static DIGITAL_MODES: &[&str] = &["FT8", "FT4", "PSK31", "PSK", "RTTY", "JS8", "JS8CALL"];

/// How CW is resolved
///
/// Live tuning hands CW to the radio as-is, while contact logging wants the
/// sideband-specific variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CwHandling {
    /// Leave `CW` unchanged
    #[default]
    PassThrough,
    /// Map `CW` onto the protocol's CW sideband pair
    Sideband,
}

/// A lower/upper pair of mode names for one protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidebandPair {
    /// Used below [`SIDEBAND_THRESHOLD_HZ`]
    pub lower: &'static str,
    /// Used at or above [`SIDEBAND_THRESHOLD_HZ`]
    pub upper: &'static str,
}

impl SidebandPair {
    const fn new(lower: &'static str, upper: &'static str) -> Self {
        Self { lower, upper }
    }

    /// Pick the designation for a frequency; unknown (`None` or 0) picks upper
    pub fn select(&self, frequency_hz: Option<u64>) -> &'static str {
        match frequency_hz {
            Some(hz) if hz > 0 && hz < SIDEBAND_THRESHOLD_HZ => self.lower,
            _ => self.upper,
        }
    }
}

impl Protocol {
    /// Voice (SSB) designations
    pub fn voice_pair(&self) -> SidebandPair {
        SidebandPair::new("LSB", "USB")
    }

    /// Data designations used for digital modes
    pub fn data_pair(&self) -> SidebandPair {
        match self {
            Protocol::Kenwood => SidebandPair::new("DATA-L", "DATA-U"),
            Protocol::Yaesu => SidebandPair::new("PKT-LSB", "PKT-USB"),
            // CI-V has a single data mode; sideband follows the radio's own setting
            Protocol::IcomCiv => SidebandPair::new("DATA", "DATA"),
        }
    }

    /// CW designations
    pub fn cw_pair(&self) -> SidebandPair {
        match self {
            Protocol::Kenwood => SidebandPair::new("CW-L", "CW-U"),
            Protocol::Yaesu | Protocol::IcomCiv => SidebandPair::new("CW-R", "CW"),
        }
    }
}

/// Whether a mode name is one of the digital data modes
pub fn is_digital(mode: &str) -> bool {
    let mode = normalize_mode(mode);
    DIGITAL_MODES.contains(&mode.as_str())
}

/// Resolve an operator-facing mode into the name a protocol's mode table uses
///
/// `SSB`, the digital modes and (with [`CwHandling::Sideband`]) `CW` are
/// mapped by frequency; everything else is returned unchanged.
pub fn resolve_mode(
    mode: &str,
    frequency_hz: Option<u64>,
    protocol: Protocol,
    cw: CwHandling,
) -> String {
    let normalized = normalize_mode(mode);

    let pair = match normalized.as_str() {
        "SSB" => protocol.voice_pair(),
        "CW" if cw == CwHandling::Sideband => protocol.cw_pair(),
        m if DIGITAL_MODES.contains(&m) => protocol.data_pair(),
        _ => return mode.to_string(),
    };

    let resolved = pair.select(frequency_hz);
    trace!(mode, ?frequency_hz, %protocol, resolved, "resolved mode");
    resolved.to_string()
}
