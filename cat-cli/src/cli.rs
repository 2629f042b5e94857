use clap::{Args, Parser, Subcommand, ValueEnum};

use cat_protocol::CwHandling;

#[derive(Parser, Debug, Clone)]
#[command(name = "potacat", version, about = "Radio control for POTA logging")]
pub struct Cli {
    #[command(flatten)]
    pub radio: RadioOpts,

    /// Talk to a simulated radio instead of hardware
    #[arg(long, global = true, default_value_t = false)]
    pub simulate: bool,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// List serial ports
    Ports,
    /// List supported radio models
    Models,
    /// Find the baud rate the radio answers at
    Detect,
    /// Read frequency and mode
    Get,
    /// Tune the radio (Hz)
    SetFreq { hz: u64 },
    /// Set the mode (SSB, CW, FT8, ... are resolved for the current band)
    SetMode { mode: String },
    /// Show what a mode resolves to, without touching the radio
    Resolve(ResolveOpts),
    /// Print frequency and mode changes until interrupted
    Poll {
        /// Poll interval in milliseconds (saved setting when absent)
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RadioOpts {
    /// Serial device path (saved setting when absent)
    #[arg(long, global = true)]
    pub port: Option<String>,
    /// Radio model name, as listed by `models`
    #[arg(long, global = true)]
    pub model: Option<String>,
    /// Baud rate (model default when absent)
    #[arg(long, global = true)]
    pub baud: Option<u32>,
    /// Remember the given port, model and baud for next time
    #[arg(long, global = true, default_value_t = false)]
    pub save: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveOpts {
    /// Operator-facing mode
    pub mode: String,
    /// Frequency in Hz (treated as upper-sideband range when absent)
    #[arg(long)]
    pub frequency: Option<u64>,
    /// How to treat CW (saved setting when absent)
    #[arg(long, value_enum)]
    pub cw: Option<CwArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CwArg {
    /// Leave CW unchanged, as live tuning does
    Pass,
    /// Map CW to the band's CW sideband, as logging does
    Sideband,
}

impl From<CwArg> for CwHandling {
    fn from(arg: CwArg) -> Self {
        match arg {
            CwArg::Pass => CwHandling::PassThrough,
            CwArg::Sideband => CwHandling::Sideband,
        }
    }
}
