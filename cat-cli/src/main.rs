//! potacat
//!
//! Command-line front end for the radio link: list ports and models, find
//! a radio's baud rate, read and set frequency and mode, and watch the
//! radio for changes.

mod cli;
mod commands;
mod settings;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

const DEFAULT_FILTER: &str =
    "potacat=info,cat_protocol=info,cat_serial=info,cat_link=info,cat_sim=info";
const VERBOSE_FILTER: &str =
    "potacat=debug,cat_protocol=debug,cat_serial=debug,cat_link=debug,cat_sim=debug";

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Include all our crates in the default filter
    let fallback = if args.verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Starting potacat {}", env!("CARGO_PKG_VERSION"));

    commands::run(args, Settings::load()).await
}
