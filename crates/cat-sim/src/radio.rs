//! Virtual radio simulation
//!
//! Provides a simulated transceiver that answers CAT commands the way the
//! real radio model would: in every protocol the model is driven with, at
//! one baud rate only.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cat_protocol::icom::{self, CivFrame};
use cat_protocol::yaesu::{self, YaesuCommand};
use cat_protocol::{kenwood, CatOperation, Protocol, RadioDatabase, RadioModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::SimError;

/// A simulated radio that answers protocol-accurate replies
#[derive(Debug)]
pub struct VirtualRadio {
    /// Model being simulated
    model: &'static RadioModel,
    /// Baud rate the radio listens at
    baud_rate: u32,
    /// Current frequency in Hz
    frequency_hz: u64,
    /// Current operating mode, as named by the mode table that set it
    mode: String,
    /// Repeat CI-V commands back before replying (single-wire interfaces)
    echo: bool,
    /// Width of the ASCII frequency field in replies
    ascii_frequency_digits: usize,
    /// Accept set commands without applying them
    frozen: bool,
    /// Stop answering entirely
    silent: bool,
    /// Delay before each reply
    reply_delay: Duration,
    /// Last DTR/RTS state driven by the controller
    control_lines: Option<bool>,
    /// Number of input flushes requested by the controller
    input_clears: usize,
    /// Every complete command received at the right baud rate
    received: Vec<Vec<u8>>,
}

/// Configuration for creating a virtual radio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualRadioConfig {
    /// Registry name of the model to simulate
    pub model: String,
    /// Baud rate to answer at (model default when absent)
    pub baud_rate: Option<u32>,
    /// Initial frequency in Hz
    pub initial_frequency_hz: u64,
    /// Initial operating mode
    pub initial_mode: String,
    /// Echo CI-V commands
    pub echo: bool,
    /// Width of the ASCII frequency field in replies
    pub ascii_frequency_digits: usize,
    /// Delay before each reply
    pub reply_delay: Duration,
}

impl Default for VirtualRadioConfig {
    fn default() -> Self {
        Self {
            model: "Kenwood TS-590".to_string(),
            baud_rate: None,
            initial_frequency_hz: 14_250_000, // 20m
            initial_mode: "USB".to_string(),
            echo: false,
            ascii_frequency_digits: kenwood::FREQUENCY_DIGITS,
            reply_delay: Duration::ZERO,
        }
    }
}

impl VirtualRadio {
    /// Create a virtual radio for a registry model with default settings
    pub fn new(model_name: &str) -> Result<Self, SimError> {
        Self::from_config(VirtualRadioConfig {
            model: model_name.to_string(),
            ..VirtualRadioConfig::default()
        })
    }

    /// Create a virtual radio from configuration
    pub fn from_config(config: VirtualRadioConfig) -> Result<Self, SimError> {
        let model = RadioDatabase::by_name(&config.model)
            .ok_or_else(|| SimError::UnknownModel(config.model.clone()))?;

        Ok(Self {
            model,
            baud_rate: config.baud_rate.unwrap_or(model.default_baud),
            frequency_hz: config.initial_frequency_hz,
            mode: config.initial_mode,
            echo: config.echo,
            ascii_frequency_digits: config.ascii_frequency_digits,
            frozen: false,
            silent: false,
            reply_delay: config.reply_delay,
            control_lines: None,
            input_clears: 0,
            received: Vec::new(),
        })
    }

    /// Model being simulated
    pub fn model(&self) -> &'static RadioModel {
        self.model
    }

    /// Baud rate the radio answers at
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Get the current frequency in Hz
    pub fn frequency_hz(&self) -> u64 {
        self.frequency_hz
    }

    /// Turn the VFO knob
    pub fn set_frequency(&mut self, hz: u64) {
        self.frequency_hz = hz;
    }

    /// Get the current operating mode
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Press a mode button
    pub fn set_mode(&mut self, mode: impl Into<String>) {
        self.mode = mode.into();
    }

    /// Accept set commands without applying them
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Stop (or resume) answering
    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    /// Delay before each reply
    pub fn reply_delay(&self) -> Duration {
        self.reply_delay
    }

    /// Last DTR/RTS state driven by the controller
    pub fn control_lines(&self) -> Option<bool> {
        self.control_lines
    }

    pub(crate) fn record_control_lines(&mut self, asserted: bool) {
        self.control_lines = Some(asserted);
    }

    /// Number of input flushes requested by the controller
    pub fn input_clears(&self) -> usize {
        self.input_clears
    }

    pub(crate) fn record_input_clear(&mut self) {
        self.input_clears += 1;
    }

    /// Commands received so far
    pub fn received(&self) -> &[Vec<u8>] {
        &self.received
    }

    /// Take and clear the received command log
    pub fn take_received(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.received)
    }

    fn speaks(&self, protocol: Protocol) -> bool {
        CatOperation::ALL
            .iter()
            .any(|op| self.model.protocol_for(*op) == protocol)
    }

    /// Consume complete commands from `input` and return the reply bytes
    ///
    /// Partial commands stay in `input` for the next call. Bytes sent at the
    /// wrong baud rate are garbage to a real radio, so they are dropped.
    pub fn process(&mut self, input: &mut Vec<u8>, baud: u32) -> Vec<u8> {
        if baud != self.baud_rate {
            trace!("Ignoring {} bytes at {} baud", input.len(), baud);
            input.clear();
            return Vec::new();
        }

        let mut output = Vec::new();
        while let Some((consumed, reply)) = self.next_command(input) {
            input.drain(..consumed);
            output.extend(reply);
        }

        if self.silent {
            output.clear();
        }
        output
    }

    /// Handle the first command in `input`; `None` means more bytes are needed
    fn next_command(&mut self, input: &[u8]) -> Option<(usize, Vec<u8>)> {
        if input.is_empty() {
            return None;
        }

        if self.speaks(Protocol::IcomCiv) {
            let Some(start) = input.windows(2).position(|w| w == icom::PREAMBLE) else {
                // Keep a trailing FE that may start the next frame
                return (input.len() > 1).then(|| (input.len() - 1, Vec::new()));
            };
            let end = input[start..].iter().position(|&b| b == icom::TERMINATOR)?;
            let frame = &input[start..start + end + 1];
            self.received.push(frame.to_vec());
            return Some((start + end + 1, self.handle_civ(frame)));
        }

        if self.speaks(Protocol::Kenwood) && input[0].is_ascii_alphabetic() {
            let end = input.iter().position(|&b| b == kenwood::TERMINATOR)?;
            let command = &input[..=end];
            self.received.push(command.to_vec());
            return Some((end + 1, self.handle_kenwood(command)));
        }

        if self.speaks(Protocol::Yaesu) {
            let frame: [u8; yaesu::COMMAND_LEN] = input.get(..yaesu::COMMAND_LEN)?.try_into().ok()?;
            self.received.push(frame.to_vec());
            return Some((yaesu::COMMAND_LEN, self.handle_yaesu(&frame)));
        }

        // Not a command this radio understands
        Some((1, Vec::new()))
    }

    fn handle_kenwood(&mut self, command: &[u8]) -> Vec<u8> {
        debug!("{} got {:?}", self.model, String::from_utf8_lossy(command));

        if command == kenwood::READ_FREQUENCY {
            return format!(
                "FA{:0width$};",
                self.frequency_hz,
                width = self.ascii_frequency_digits
            )
            .into_bytes();
        }

        if command == kenwood::READ_INFO {
            let code = kenwood::mode_code(&self.mode).unwrap_or("00");
            return kenwood::encode_info_report(self.frequency_hz, code);
        }

        if let Some(hz) = kenwood::parse_set_frequency(command) {
            if !self.frozen {
                self.frequency_hz = hz;
            }
            return Vec::new();
        }

        if let Some(code) = kenwood::parse_set_mode(command) {
            if !self.frozen {
                self.mode = kenwood::mode_name(&code).to_string();
            }
            return Vec::new();
        }

        b"?;".to_vec()
    }

    fn handle_yaesu(&mut self, frame: &[u8; yaesu::COMMAND_LEN]) -> Vec<u8> {
        debug!("{} got {:02X?}", self.model, frame);

        match YaesuCommand::parse(frame) {
            YaesuCommand::ReadStatus => {
                let code = yaesu::mode_code(&self.mode).unwrap_or(0xFF);
                yaesu::encode_status_report(self.frequency_hz, code).to_vec()
            }
            YaesuCommand::SetFrequency { hz } => {
                if !self.frozen {
                    self.frequency_hz = hz;
                }
                Vec::new()
            }
            YaesuCommand::SetMode { code } => {
                if !self.frozen {
                    self.mode = yaesu::mode_name(code).to_string();
                }
                Vec::new()
            }
            YaesuCommand::Other(_) => Vec::new(),
        }
    }

    fn handle_civ(&mut self, bytes: &[u8]) -> Vec<u8> {
        debug!("{} got {:02X?}", self.model, bytes);

        let Ok(frame) = CivFrame::parse(bytes) else {
            return Vec::new();
        };
        let address = self.model.civ_address();
        if frame.from_addr != icom::CONTROLLER_ADDR || (frame.to_addr != address && frame.to_addr != 0x00) {
            return Vec::new();
        }

        let mut reply = if self.echo { bytes.to_vec() } else { Vec::new() };
        let answer = match frame.command {
            icom::CMD_READ_FREQUENCY => icom::encode_frequency_report(address, self.frequency_hz),
            icom::CMD_READ_MODE => {
                let code = icom::mode_code(&self.mode).unwrap_or(0xFF);
                icom::encode_mode_report(address, code, icom::DEFAULT_FILTER)
            }
            icom::CMD_SET_FREQUENCY => match icom::bcd_to_frequency(&frame.data) {
                Ok(hz) if frame.data.len() == icom::FREQUENCY_BYTES => {
                    if !self.frozen {
                        self.frequency_hz = hz;
                    }
                    icom::encode_ack(address, true)
                }
                _ => icom::encode_ack(address, false),
            },
            icom::CMD_SET_MODE => match frame.data.first() {
                Some(&code) => {
                    if !self.frozen {
                        self.mode = icom::mode_name(code).to_string();
                    }
                    icom::encode_ack(address, true)
                }
                None => icom::encode_ack(address, false),
            },
            _ => icom::encode_ack(address, false),
        };
        reply.extend(answer);
        reply
    }
}

/// A virtual radio shared between its connection tasks and the test driving it
#[derive(Debug, Clone)]
pub struct RadioHandle(Arc<Mutex<VirtualRadio>>);

impl RadioHandle {
    pub fn new(radio: VirtualRadio) -> Self {
        Self(Arc::new(Mutex::new(radio)))
    }

    /// Lock the radio's state
    pub fn lock(&self) -> MutexGuard<'_, VirtualRadio> {
        // A panicking test thread must not wedge the simulator
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(radio: &mut VirtualRadio, bytes: &[u8]) -> Vec<u8> {
        let mut input = bytes.to_vec();
        let baud = radio.baud_rate();
        radio.process(&mut input, baud)
    }

    #[test]
    fn test_create_virtual_radio() {
        let radio = VirtualRadio::new("Icom IC-7300").unwrap();
        assert_eq!(radio.baud_rate(), 19200);
        assert_eq!(radio.frequency_hz(), 14_250_000);
        assert_eq!(radio.mode(), "USB");
        assert_eq!(radio.control_lines(), None);
    }

    #[test]
    fn test_unknown_model() {
        assert!(matches!(
            VirtualRadio::new("Icom IC-7301"),
            Err(SimError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_kenwood_frequency_roundtrip() {
        let mut radio = VirtualRadio::new("Kenwood TS-590").unwrap();
        assert!(run(&mut radio, b"FA007074000;").is_empty());
        assert_eq!(run(&mut radio, b"FA;"), b"FA007074000;");
    }

    #[test]
    fn test_kenwood_wide_field() {
        let mut radio = VirtualRadio::from_config(VirtualRadioConfig {
            ascii_frequency_digits: 11,
            initial_frequency_hz: 14_300_000,
            ..VirtualRadioConfig::default()
        })
        .unwrap();
        assert_eq!(run(&mut radio, b"FA;"), b"FA00014300000;");
    }

    #[test]
    fn test_kenwood_mode() {
        let mut radio = VirtualRadio::new("Yaesu FT-DX10").unwrap();
        run(&mut radio, b"MD0C;");
        assert_eq!(radio.mode(), "DATA-U");
        assert_eq!(kenwood::decode_mode(&run(&mut radio, b"IF;")).unwrap(), "DATA-U");
    }

    #[test]
    fn test_partial_command_waits() {
        let mut radio = VirtualRadio::new("Kenwood TS-590").unwrap();
        let mut input = b"FA".to_vec();
        assert!(radio.process(&mut input, 115200).is_empty());
        assert_eq!(input, b"FA");

        input.extend(b";");
        assert_eq!(radio.process(&mut input, 115200), b"FA014250000;");
        assert!(input.is_empty());
    }

    #[test]
    fn test_wrong_baud_is_ignored() {
        let mut radio = VirtualRadio::new("Kenwood TS-590").unwrap();
        let mut input = b"FA;".to_vec();
        assert!(radio.process(&mut input, 9600).is_empty());
        assert!(input.is_empty());
        assert!(radio.received().is_empty());
    }

    #[test]
    fn test_yaesu_status_and_set() {
        let mut radio = VirtualRadio::new("Yaesu FT-891").unwrap();
        run(&mut radio, &yaesu::encode_set_frequency(7_074_000).unwrap());
        run(&mut radio, &yaesu::encode_set_mode("PKT-LSB").unwrap());

        let status = run(&mut radio, &yaesu::READ_STATUS);
        assert_eq!(yaesu::decode_frequency(&status).unwrap(), 7_074_000);
        assert_eq!(yaesu::decode_mode(&status).unwrap(), "PKT-LSB");
    }

    #[test]
    fn test_civ_echo_and_ack() {
        let mut radio = VirtualRadio::from_config(VirtualRadioConfig {
            model: "Icom IC-705".to_string(),
            echo: true,
            ..VirtualRadioConfig::default()
        })
        .unwrap();

        let command = icom::encode_set_frequency(0xA4, 7_200_000).unwrap();
        let reply = run(&mut radio, &command);
        assert!(reply.starts_with(&command));
        assert_eq!(&reply[command.len()..], icom::encode_ack(0xA4, true).as_slice());
        assert_eq!(radio.frequency_hz(), 7_200_000);
    }

    #[test]
    fn test_civ_ignores_other_addresses() {
        let mut radio = VirtualRadio::new("Icom IC-7300").unwrap();
        assert!(run(&mut radio, &icom::encode_read_frequency(0xA4)).is_empty());
    }

    #[test]
    fn test_frozen_radio_ignores_sets() {
        let mut radio = VirtualRadio::new("Kenwood TS-480").unwrap();
        radio.set_frozen(true);
        run(&mut radio, b"FA007074000;");
        assert_eq!(radio.frequency_hz(), 14_250_000);
    }

    #[test]
    fn test_silent_radio() {
        let mut radio = VirtualRadio::new("Kenwood TS-480").unwrap();
        radio.set_silent(true);
        assert!(run(&mut radio, b"FA;").is_empty());
        assert_eq!(radio.received().len(), 1);
    }
}
