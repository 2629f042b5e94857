//! Subcommand handlers

use std::time::Duration;

use anyhow::{bail, Context, Result};
use cat_link::{LinkConfig, LinkEvent, RadioLink};
use cat_protocol::{resolve_mode, CatOperation, RadioDatabase, RadioModel};
use cat_serial::{detect_baud_rate, DetectConfig, PortOpener, PortScanner, SerialOpener};
use cat_sim::{RadioHandle, VirtualOpener, VirtualRadio};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::cli::{Cli, Cmd, ResolveOpts};
use crate::settings::Settings;

/// Port name shown for the simulated radio
const SIM_PORT: &str = "SIM";

pub async fn run(cli: Cli, mut settings: Settings) -> Result<()> {
    settings.apply(&cli.radio);
    execute(&cli, &mut settings).await?;

    if cli.radio.save {
        settings.save()?;
        info!("Settings saved");
    }
    Ok(())
}

async fn execute(cli: &Cli, settings: &mut Settings) -> Result<()> {
    match &cli.cmd {
        Cmd::Ports => list_ports(),
        Cmd::Models => {
            list_models();
            Ok(())
        }
        Cmd::Resolve(opts) => resolve(opts, settings),
        cmd => {
            let model = require_model(settings)?;
            if cli.simulate {
                let radio = VirtualRadio::new(model.name)?;
                info!("Simulating {}", model);
                let opener = VirtualOpener::new(RadioHandle::new(radio));
                let port = settings.port.clone().unwrap_or_else(|| SIM_PORT.to_string());
                run_radio(opener, cmd, &port, model, settings).await
            } else {
                let port = settings
                    .port
                    .clone()
                    .context("no serial port given; pass --port (see `potacat ports`)")?;
                run_radio(SerialOpener, cmd, &port, model, settings).await
            }
        }
    }
}

fn require_model(settings: &Settings) -> Result<&'static RadioModel> {
    let name = settings
        .model
        .as_deref()
        .context("no radio model given; pass --model (see `potacat models`)")?;
    RadioDatabase::by_name(name)
        .with_context(|| format!("unknown radio model {:?} (see `potacat models`)", name))
}

fn list_ports() -> Result<()> {
    let ports = PortScanner::new()
        .enumerate_ports()
        .context("failed to list serial ports")?;

    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        let ids = match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => format!("{:04x}:{:04x}", vid, pid),
            _ => String::new(),
        };
        print!(
            "{:<24} {:<9} {:<16} {}",
            port.port,
            ids,
            port.kind.to_string(),
            port.description()
        );
        if let Some(protocol) = port.kind.suggested_protocol() {
            print!("  (try a {} model)", protocol.name());
        }
        println!();
    }
    Ok(())
}

fn list_models() {
    for model in RadioDatabase::all() {
        let overrides = model
            .overrides
            .iter()
            .map(|(op, protocol)| format!("{}={}", op, protocol))
            .collect::<Vec<_>>();

        print!(
            "{:<20} {:<10} {:>6} baud",
            model.name,
            model.protocol.name(),
            model.default_baud
        );
        if let Some(addr) = model.civ_address {
            print!("  CI-V 0x{:02X}", addr);
        }
        if !overrides.is_empty() {
            print!("  [{}]", overrides.join(", "));
        }
        println!();
    }
}

fn resolve(opts: &ResolveOpts, settings: &Settings) -> Result<()> {
    let model = require_model(settings)?;
    let protocol = model.protocol_for(CatOperation::SetMode);
    let cw = opts.cw.map(Into::into).unwrap_or(settings.cw_handling);

    println!("{}", resolve_mode(&opts.mode, opts.frequency, protocol, cw));
    Ok(())
}

async fn run_radio<O: PortOpener>(
    opener: O,
    cmd: &Cmd,
    port: &str,
    model: &'static RadioModel,
    settings: &mut Settings,
) -> Result<()> {
    if let Cmd::Detect = cmd {
        return detect(&opener, port, model, settings).await;
    }

    let config = LinkConfig {
        poll_interval: Duration::from_millis(settings.poll_interval_ms),
        cw_handling: settings.cw_handling,
        ..LinkConfig::default()
    };
    let link = RadioLink::with_opener(opener, config);
    let hz = link
        .connect(port, model.name, settings.baud)
        .await
        .with_context(|| format!("could not connect to {} on {}", model, port))?;
    debug!("Connected at {} Hz", hz);

    let result = run_command(&link, cmd, hz).await;
    link.disconnect().await;
    result
}

async fn run_command<O: PortOpener>(
    link: &RadioLink<O>,
    cmd: &Cmd,
    connected_hz: u64,
) -> Result<()> {
    match cmd {
        Cmd::Get => {
            let mode = link.get_mode().await.context("failed to read mode")?;
            println!("{} {}", format_mhz(connected_hz), mode);
        }
        Cmd::SetFreq { hz } => {
            link.set_frequency(*hz)
                .await
                .with_context(|| format!("failed to tune to {} Hz", hz))?;
            println!("{}", format_mhz(*hz));
        }
        Cmd::SetMode { mode } => {
            let sent = link
                .set_mode(mode)
                .await
                .with_context(|| format!("failed to set mode {}", mode))?;
            println!("{}", sent);
        }
        Cmd::Poll { interval_ms } => {
            poll(link, interval_ms.map(Duration::from_millis)).await?;
        }
        Cmd::Ports | Cmd::Models | Cmd::Detect | Cmd::Resolve(_) => {}
    }
    Ok(())
}

async fn detect<O: PortOpener>(
    opener: &O,
    port: &str,
    model: &'static RadioModel,
    settings: &mut Settings,
) -> Result<()> {
    let found = detect_baud_rate(opener, port, model.name, &DetectConfig::default())
        .await
        .context("baud detection failed")?;

    match found {
        Some(baud) => {
            println!("{} answers at {} baud on {}", model, baud, port);
            settings.baud = Some(baud);
            Ok(())
        }
        None => bail!("{} did not answer on {} at any baud rate", model, port),
    }
}

async fn poll<O: PortOpener>(link: &RadioLink<O>, interval: Option<Duration>) -> Result<()> {
    let mut events = link.subscribe();
    link.start_polling(interval);

    if let (Some(hz), Ok(mode)) = (link.current_frequency().await, link.get_mode().await) {
        println!("{} {}", format_mhz(hz), mode);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(LinkEvent::FrequencyChanged(hz)) => println!("{}", format_mhz(hz)),
                Ok(LinkEvent::ModeChanged(mode)) => println!("{}", mode),
                Ok(LinkEvent::ConnectionChanged(false)) => bail!("radio stopped answering"),
                Ok(LinkEvent::ConnectionChanged(true)) => {}
                Err(RecvError::Lagged(n)) => debug!("Missed {} events", n),
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

/// `14.074000 MHz`
fn format_mhz(hz: u64) -> String {
    format!("{}.{:06} MHz", hz / 1_000_000, hz % 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mhz() {
        assert_eq!(format_mhz(14_074_000), "14.074000 MHz");
        assert_eq!(format_mhz(7_000_500), "7.000500 MHz");
    }

    #[test]
    fn test_require_model() {
        let mut settings = Settings::default();
        assert!(require_model(&settings).is_err());

        settings.model = Some("Icom IC-7300".into());
        assert_eq!(require_model(&settings).unwrap().civ_address, Some(0x94));

        settings.model = Some("Icom IC-7301".into());
        assert!(require_model(&settings).is_err());
    }

    #[tokio::test]
    async fn test_simulated_set_frequency() {
        let model = RadioDatabase::by_name("Yaesu FT-891").unwrap();
        let radio = RadioHandle::new(VirtualRadio::new(model.name).unwrap());
        let mut settings = Settings::default();

        run_radio(
            VirtualOpener::new(radio.clone()),
            &Cmd::SetFreq { hz: 7_074_000 },
            SIM_PORT,
            model,
            &mut settings,
        )
        .await
        .unwrap();

        // The radio task applies the set after the link has hung up
        tokio::time::timeout(Duration::from_secs(2), async {
            while radio.lock().frequency_hz() != 7_074_000 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("simulated radio never tuned to 7.074 MHz");
        assert_eq!(radio.lock().received().len(), 2);
    }
}
