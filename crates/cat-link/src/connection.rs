//! One open radio connection and the per-protocol command exchanges
//!
//! A [`Connection`] only exists while the link is connected and is always
//! reached through the link's lock, so nothing here needs to worry about
//! another command sharing the transport.

use std::io;

use cat_protocol::{icom, kenwood, yaesu, CatOperation, Protocol, RadioModel};
use cat_serial::{read_reply, write_command, CatTransport};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::events::LinkEvent;

/// Largest frequency error accepted when reading back an ASCII set
pub const VERIFY_TOLERANCE_HZ: u64 = 100;

pub(crate) struct Connection<T> {
    transport: T,
    pub(crate) model: &'static RadioModel,
    pub(crate) port: String,
    pub(crate) baud: u32,
    pub(crate) frequency_hz: Option<u64>,
    pub(crate) mode: Option<String>,
    pub(crate) failures: u32,
    events: broadcast::Sender<LinkEvent>,
}

impl<T: CatTransport> Connection<T> {
    pub(crate) fn new(
        transport: T,
        model: &'static RadioModel,
        port: &str,
        baud: u32,
        events: broadcast::Sender<LinkEvent>,
    ) -> Self {
        Self {
            transport,
            model,
            port: port.to_string(),
            baud,
            frequency_hz: None,
            mode: None,
            failures: 0,
            events,
        }
    }

    // -------------------------------------------------------------------------
    // Public operations (dispatch on the effective protocol)
    // -------------------------------------------------------------------------

    /// Read the frequency and update the cache
    pub(crate) async fn get_frequency(&mut self, config: &LinkConfig) -> Result<u64, LinkError> {
        let protocol = self.model.protocol_for(CatOperation::GetFrequency);
        let hz = self.read_frequency(protocol, config).await?;
        self.cache_frequency(hz);
        Ok(hz)
    }

    pub(crate) async fn set_frequency(
        &mut self,
        hz: u64,
        config: &LinkConfig,
    ) -> Result<(), LinkError> {
        let protocol = self.model.protocol_for(CatOperation::SetFrequency);
        debug!("Setting {} to {} Hz via {}", self.model, hz, protocol);

        match protocol {
            Protocol::Kenwood => {
                let command = kenwood::encode_set_frequency(hz)?;
                self.send(CatOperation::SetFrequency, &command, config).await?;
                tokio::time::sleep(config.settle).await;

                let actual = self.read_frequency(Protocol::Kenwood, config).await?;
                self.cache_frequency(actual);
                if actual.abs_diff(hz) >= VERIFY_TOLERANCE_HZ {
                    return Err(LinkError::VerificationFailed {
                        expected: format!("{} Hz", hz),
                        actual: format!("{} Hz", actual),
                    });
                }
            }
            Protocol::Yaesu => {
                let command = yaesu::encode_set_frequency(hz)?;
                self.send(CatOperation::SetFrequency, &command, config).await?;
                // The BCD field carries 10 Hz steps
                self.cache_frequency(hz / 10 * 10);
            }
            Protocol::IcomCiv => {
                let command = icom::encode_set_frequency(self.model.civ_address(), hz)?;
                self.send_with_ack(CatOperation::SetFrequency, &command, config)
                    .await?;
                self.cache_frequency(hz);
            }
        }
        Ok(())
    }

    /// Read the mode and update the cache
    pub(crate) async fn get_mode(&mut self, config: &LinkConfig) -> Result<String, LinkError> {
        let protocol = self.model.protocol_for(CatOperation::GetMode);
        let mode = self.read_mode(protocol, config).await?;
        self.cache_mode(mode);
        Ok(mode.to_string())
    }

    /// Set a mode already named the way the set-mode protocol names it
    pub(crate) async fn set_mode(&mut self, mode: &str, config: &LinkConfig) -> Result<(), LinkError> {
        let protocol = self.model.protocol_for(CatOperation::SetMode);
        debug!("Setting {} to {} via {}", self.model, mode, protocol);

        match protocol {
            Protocol::Kenwood => {
                let command = kenwood::encode_set_mode(mode)?;
                self.send(CatOperation::SetMode, &command, config).await?;
                tokio::time::sleep(config.settle).await;

                let actual = self.read_mode(Protocol::Kenwood, config).await?;
                self.cache_mode(actual);
                if !actual.eq_ignore_ascii_case(mode.trim()) {
                    return Err(LinkError::VerificationFailed {
                        expected: mode.trim().to_string(),
                        actual: actual.to_string(),
                    });
                }
            }
            Protocol::Yaesu => {
                let command = yaesu::encode_set_mode(mode)?;
                self.send(CatOperation::SetMode, &command, config).await?;
                self.cache_mode(yaesu::mode_name(command[0]));
            }
            Protocol::IcomCiv => {
                let command = icom::encode_set_mode(self.model.civ_address(), mode)?;
                self.send_with_ack(CatOperation::SetMode, &command, config)
                    .await?;
                if let Some(code) = icom::mode_code(mode) {
                    self.cache_mode(icom::mode_name(code));
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Codec-specific reads
    // -------------------------------------------------------------------------

    /// Read the frequency with an explicit protocol, without touching the cache
    pub(crate) async fn read_frequency(
        &mut self,
        protocol: Protocol,
        config: &LinkConfig,
    ) -> Result<u64, LinkError> {
        let op = CatOperation::GetFrequency;
        let query = protocol.frequency_query(self.model.civ_address());
        let reply = self
            .query(op, protocol, &query, protocol.frequency_read_len(), config)
            .await?;

        let hz = match protocol {
            Protocol::Kenwood => kenwood::decode_frequency(&reply)?,
            Protocol::Yaesu => yaesu::decode_frequency(&reply)?,
            Protocol::IcomCiv => icom::decode_frequency(icom::reply_frame(op, &query, &reply))?,
        };
        trace!("{} reports {} Hz", self.model, hz);
        Ok(hz)
    }

    async fn read_mode(
        &mut self,
        protocol: Protocol,
        config: &LinkConfig,
    ) -> Result<&'static str, LinkError> {
        let op = CatOperation::GetMode;
        let mode = match protocol {
            Protocol::Kenwood => {
                let reply = self
                    .query(op, protocol, kenwood::READ_INFO, kenwood::MAX_REPLY_LEN, config)
                    .await?;
                kenwood::decode_mode(&reply)?
            }
            Protocol::Yaesu => {
                let reply = self
                    .query(op, protocol, &yaesu::READ_STATUS, yaesu::STATUS_READ_LEN, config)
                    .await?;
                yaesu::decode_mode(&reply)?
            }
            Protocol::IcomCiv => {
                let query = icom::encode_read_mode(self.model.civ_address());
                let reply = self
                    .query(op, protocol, &query, icom::MODE_READ_LEN, config)
                    .await?;
                icom::decode_mode(icom::reply_frame(op, &query, &reply))?
            }
        };
        trace!("{} reports mode {}", self.model, mode);
        Ok(mode)
    }

    // -------------------------------------------------------------------------
    // Wire exchanges
    // -------------------------------------------------------------------------

    /// Write a command that expects a reply and read it
    async fn query(
        &mut self,
        op: CatOperation,
        protocol: Protocol,
        command: &[u8],
        max_len: usize,
        config: &LinkConfig,
    ) -> Result<Vec<u8>, LinkError> {
        self.transport.clear_input()?;
        self.send(op, command, config).await?;
        tokio::time::sleep(config.settle).await;

        let reply = read_reply(&mut self.transport, max_len, config.read_timeout, |buf| {
            protocol.reply_complete(op, buf)
        })
        .await?;

        if reply.is_empty() {
            return Err(LinkError::Timeout(op));
        }
        Ok(reply)
    }

    /// Write a command without reading anything back
    async fn send(
        &mut self,
        op: CatOperation,
        command: &[u8],
        config: &LinkConfig,
    ) -> Result<(), LinkError> {
        write_command(&mut self.transport, command, config.write_timeout)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::TimedOut => LinkError::Timeout(op),
                _ => LinkError::Io(e),
            })
    }

    /// Write a CI-V set command and collect the radio's acknowledgement
    ///
    /// A NAK fails the command. Some interfaces never acknowledge, so a
    /// missing reply is accepted.
    async fn send_with_ack(
        &mut self,
        op: CatOperation,
        command: &[u8],
        config: &LinkConfig,
    ) -> Result<(), LinkError> {
        self.transport.clear_input()?;
        self.send(op, command, config).await?;

        // Room for our own echo plus the acknowledgement frame
        let max_len = command.len() + icom::MIN_FRAME_LEN;
        let reply = read_reply(&mut self.transport, max_len, config.read_timeout, |buf| {
            icom::reply_complete(op, buf)
        })
        .await?;

        let frame = icom::reply_frame(op, command, &reply);
        match frame.get(4) {
            Some(&icom::NAK) if frame.starts_with(&icom::PREAMBLE) => {
                Err(LinkError::Protocol(cat_protocol::ProtocolError::InvalidResponse(
                    format!("{} rejected {}", self.model, op),
                )))
            }
            Some(&icom::ACK) => Ok(()),
            _ => {
                debug!("No acknowledgement for {} from {}", op, self.model);
                Ok(())
            }
        }
    }

    // -------------------------------------------------------------------------
    // Cache
    // -------------------------------------------------------------------------

    fn cache_frequency(&mut self, hz: u64) {
        if self.frequency_hz != Some(hz) {
            self.frequency_hz = Some(hz);
            let _ = self.events.send(LinkEvent::FrequencyChanged(hz));
        }
    }

    fn cache_mode(&mut self, mode: &str) {
        if self.mode.as_deref() != Some(mode) {
            self.mode = Some(mode.to_string());
            let _ = self.events.send(LinkEvent::ModeChanged(mode.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// BCD radio that reads its frequency through the ASCII command set only
    static PARTIAL: RadioModel = RadioModel {
        name: "Partial",
        manufacturer: "Test",
        protocol: Protocol::Yaesu,
        default_baud: 9600,
        civ_address: None,
        overrides: &[(CatOperation::GetFrequency, Protocol::Kenwood)],
    };

    fn test_config() -> LinkConfig {
        LinkConfig {
            read_timeout: Duration::from_millis(200),
            settle: Duration::from_millis(1),
            ..LinkConfig::default()
        }
    }

    #[tokio::test]
    async fn test_each_operation_uses_its_own_protocol() {
        let (ours, mut radio) = tokio::io::duplex(256);
        let (events, mut rx) = broadcast::channel(8);
        let mut conn = Connection::new(ours, &PARTIAL, "mock", 9600, events);
        let config = test_config();

        let radio_side = tokio::spawn(async move {
            let mut query = [0u8; 3];
            radio.read_exact(&mut query).await.unwrap();
            radio.write_all(b"FA014074000;").await.unwrap();

            let mut frame = [0u8; yaesu::COMMAND_LEN];
            radio.read_exact(&mut frame).await.unwrap();
            (query, frame)
        });

        assert_eq!(conn.get_frequency(&config).await.unwrap(), 14_074_000);
        conn.set_mode("USB", &config).await.unwrap();

        let (query, frame) = radio_side.await.unwrap();
        assert_eq!(&query, kenwood::READ_FREQUENCY);
        assert_eq!(frame, yaesu::encode_set_mode("USB").unwrap());

        assert_eq!(rx.try_recv().unwrap(), LinkEvent::FrequencyChanged(14_074_000));
        assert_eq!(rx.try_recv().unwrap(), LinkEvent::ModeChanged("USB".into()));
    }

    #[tokio::test]
    async fn test_fallback_set_frequency_sends_bcd() {
        let (ours, mut radio) = tokio::io::duplex(256);
        let (events, _rx) = broadcast::channel(8);
        let mut conn = Connection::new(ours, &PARTIAL, "mock", 9600, events);

        conn.set_frequency(7_074_005, &test_config()).await.unwrap();

        let mut frame = [0u8; yaesu::COMMAND_LEN];
        radio.read_exact(&mut frame).await.unwrap();
        assert_eq!(frame, yaesu::encode_set_frequency(7_074_000).unwrap());
        assert_eq!(conn.frequency_hz, Some(7_074_000));
    }
}
