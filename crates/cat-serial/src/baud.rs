//! Baud-rate auto-detection
//!
//! Tries each candidate rate for a model's frequency protocol in turn: open
//! the port, set the control lines, send one frequency query and look at
//! what comes back. The first rate with a plausible reply wins.
//!
//! Detection opens and closes the port once per candidate. Do not run it
//! while a link is connected to the same port.

use std::time::Duration;

use cat_protocol::{icom, CatOperation, Protocol, RadioDatabase, RadioModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DetectError;
use crate::transport::{
    apply_control_lines, read_reply, write_command, CatTransport, PortOpener, PortSettings,
};

/// Configuration for baud detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectConfig {
    /// How long to wait for a reply at each rate (a normal exchange bound)
    pub read_timeout: Duration,
    /// Bound on writing the query
    pub write_timeout: Duration,
    /// Pause after opening before any traffic
    pub settle: Duration,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(2),
            settle: Duration::from_millis(50),
        }
    }
}

/// Find the baud rate `model_name` answers at on `port`
///
/// Returns `Ok(None)` when no candidate produced a plausible reply. Failures
/// at a single rate are logged and do not stop the scan.
pub async fn detect_baud_rate<O: PortOpener>(
    opener: &O,
    port: &str,
    model_name: &str,
    config: &DetectConfig,
) -> Result<Option<u32>, DetectError> {
    let model = RadioDatabase::by_name(model_name)
        .ok_or_else(|| DetectError::UnsupportedModel(model_name.to_string()))?;
    let protocol = model.protocol_for(CatOperation::GetFrequency);

    info!(
        "Detecting baud rate for {} on {} ({} protocol)",
        model, port, protocol
    );

    for &baud in protocol.baud_candidates() {
        match probe_at(opener, port, model, protocol, baud, config).await {
            Ok(()) => {
                info!("{} answered on {} at {} baud", model, port, baud);
                return Ok(Some(baud));
            }
            Err(e @ DetectError::OpenFailed { .. }) | Err(e @ DetectError::IoError { .. }) => {
                warn!("Skipping {} baud: {}", baud, e);
            }
            Err(e) => debug!("No answer at {} baud: {}", baud, e),
        }
    }

    info!("No baud rate found for {} on {}", model, port);
    Ok(None)
}

/// Probe one candidate rate; the transport is dropped before returning
async fn probe_at<O: PortOpener>(
    opener: &O,
    port: &str,
    model: &RadioModel,
    protocol: Protocol,
    baud: u32,
    config: &DetectConfig,
) -> Result<(), DetectError> {
    debug!("Probing {} at {} baud", port, baud);

    let io_err = |e: std::io::Error| DetectError::IoError {
        port: port.to_string(),
        reason: e.to_string(),
    };

    let mut transport = opener
        .open(port, &PortSettings::new(baud, config.read_timeout))
        .map_err(|e| DetectError::OpenFailed {
            port: port.to_string(),
            reason: e.to_string(),
        })?;

    apply_control_lines(&mut transport, model).map_err(io_err)?;

    // Give the port a moment to settle
    tokio::time::sleep(config.settle).await;

    let query = protocol.frequency_query(model.civ_address());
    let reply = exchange(&mut transport, protocol, &query, config)
        .await
        .map_err(io_err)?;

    if reply.is_empty() {
        return Err(DetectError::Timeout {
            port: port.to_string(),
            baud,
        });
    }

    let reply = match protocol {
        Protocol::IcomCiv => icom::strip_echo(&query, &reply),
        _ => &reply[..],
    };

    if protocol.is_plausible_frequency_reply(reply) {
        Ok(())
    } else {
        Err(DetectError::Implausible {
            port: port.to_string(),
            baud,
            reply: reply.to_vec(),
        })
    }
}

async fn exchange<T: CatTransport>(
    transport: &mut T,
    protocol: Protocol,
    query: &[u8],
    config: &DetectConfig,
) -> std::io::Result<Vec<u8>> {
    transport.clear_input()?;
    write_command(transport, query, config.write_timeout).await?;
    read_reply(
        transport,
        protocol.frequency_read_len(),
        config.read_timeout,
        |buf| protocol.reply_complete(CatOperation::GetFrequency, buf),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    /// Opener whose "radio" only answers at one baud rate
    struct ScriptedOpener {
        answer_at: u32,
        reply: Vec<u8>,
        fail_at: Option<u32>,
        opens: Arc<Mutex<Vec<u32>>>,
    }

    impl ScriptedOpener {
        fn new(answer_at: u32, reply: &[u8]) -> Self {
            Self {
                answer_at,
                reply: reply.to_vec(),
                fail_at: None,
                opens: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn opens(&self) -> Vec<u32> {
            self.opens.lock().unwrap().clone()
        }
    }

    impl PortOpener for ScriptedOpener {
        type Transport = DuplexStream;

        fn open(&self, _port: &str, settings: &PortSettings) -> io::Result<DuplexStream> {
            self.opens.lock().unwrap().push(settings.baud_rate);
            if self.fail_at == Some(settings.baud_rate) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "port busy"));
            }

            let (client, mut radio) = tokio::io::duplex(256);
            let reply = (settings.baud_rate == self.answer_at).then(|| self.reply.clone());
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                if let (Ok(n), Some(reply)) = (radio.read(&mut buf).await, reply) {
                    if n > 0 {
                        let _ = radio.write_all(&reply).await;
                    }
                }
                // Hold the line open until the prober hangs up
                let _ = radio.read(&mut buf).await;
            });
            Ok(client)
        }
    }

    fn fast_config() -> DetectConfig {
        DetectConfig {
            read_timeout: Duration::from_millis(50),
            write_timeout: Duration::from_millis(50),
            settle: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_default_timeouts_match_link_exchanges() {
        let config = DetectConfig::default();
        assert_eq!(config.read_timeout, Duration::from_secs(1));
        assert_eq!(config.write_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_stops_at_second_candidate() {
        let opener = ScriptedOpener::new(115200, b"FA014074000;");
        let baud = detect_baud_rate(&opener, "sim", "Kenwood TS-480", &fast_config())
            .await
            .unwrap();

        assert_eq!(baud, Some(115200));
        assert_eq!(opener.opens(), vec![57600, 115200]);
    }

    #[tokio::test]
    async fn test_candidates_follow_frequency_override() {
        // FT-DX10 is a Yaesu but reads frequency with Kenwood commands
        let opener = ScriptedOpener::new(4800, b"FA007074000;");
        let baud = detect_baud_rate(&opener, "sim", "Yaesu FT-DX10", &fast_config())
            .await
            .unwrap();

        assert_eq!(baud, Some(4800));
        assert_eq!(
            opener.opens(),
            vec![57600, 115200, 38400, 19200, 9600, 4800]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_returns_none() {
        let opener = ScriptedOpener::new(0, b"");
        let baud = detect_baud_rate(&opener, "sim", "Yaesu FT-891", &fast_config())
            .await
            .unwrap();

        assert_eq!(baud, None);
        assert_eq!(opener.opens(), vec![38400, 19200, 9600, 4800]);
    }

    #[tokio::test]
    async fn test_short_reply_is_not_a_match() {
        let opener = ScriptedOpener::new(38400, &[0x01, 0x42]);
        let baud = detect_baud_rate(&opener, "sim", "Yaesu FT-991", &fast_config())
            .await
            .unwrap();
        assert_eq!(baud, None);
    }

    #[tokio::test]
    async fn test_open_failure_continues_scan() {
        let mut opener = ScriptedOpener::new(9600, &icom::encode_frequency_report(0x94, 7_074_000));
        opener.fail_at = Some(19200);

        let baud = detect_baud_rate(&opener, "sim", "Icom IC-7300", &fast_config())
            .await
            .unwrap();

        assert_eq!(baud, Some(9600));
        assert_eq!(opener.opens(), vec![19200, 9600]);
    }

    #[tokio::test]
    async fn test_icom_echo_alone_is_not_a_match() {
        let echo = icom::encode_read_frequency(0x00);
        let opener = ScriptedOpener::new(19200, &echo);
        let baud = detect_baud_rate(&opener, "sim", "Generic Icom", &fast_config())
            .await
            .unwrap();
        assert_eq!(baud, None);
    }

    #[tokio::test]
    async fn test_unknown_model() {
        let opener = ScriptedOpener::new(9600, b"FA014074000;");
        let err = detect_baud_rate(&opener, "sim", "Kenwood TS-2000X", &fast_config())
            .await
            .unwrap_err();

        assert!(matches!(err, DetectError::UnsupportedModel(_)));
        assert!(opener.opens().is_empty());
    }
}
