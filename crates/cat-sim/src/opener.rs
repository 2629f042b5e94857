//! Virtual serial ports
//!
//! [`VirtualOpener`] stands in for real hardware wherever a
//! [`PortOpener`] is accepted. Each open spawns a
//! [`run_virtual_radio_task`] on the current tokio runtime, so it must be
//! called from within one.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use cat_serial::{CatTransport, PortOpener, PortSettings};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tracing::debug;

use crate::radio::RadioHandle;
use crate::radio_task::run_virtual_radio_task;

/// Buffer size of the in-memory pipe
const PIPE_CAPACITY: usize = 4096;

/// Opens connections to a virtual radio
#[derive(Debug, Clone)]
pub struct VirtualOpener {
    radio: RadioHandle,
    opens: Arc<Mutex<Vec<u32>>>,
}

impl VirtualOpener {
    pub fn new(radio: RadioHandle) -> Self {
        Self {
            radio,
            opens: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The radio behind every port this opener hands out
    pub fn radio(&self) -> &RadioHandle {
        &self.radio
    }

    /// Baud rates of every open so far, in order
    pub fn opens(&self) -> Vec<u32> {
        self.opens
            .lock()
            .map(|o| o.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl PortOpener for VirtualOpener {
    type Transport = VirtualPort;

    fn open(&self, port: &str, settings: &PortSettings) -> io::Result<VirtualPort> {
        debug!("Opening virtual port {} at {} baud", port, settings.baud_rate);
        self.opens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(settings.baud_rate);

        let (controller, radio_end) = tokio::io::duplex(PIPE_CAPACITY);
        tokio::spawn(run_virtual_radio_task(
            radio_end,
            self.radio.clone(),
            settings.baud_rate,
        ));

        Ok(VirtualPort {
            stream: controller,
            radio: self.radio.clone(),
        })
    }
}

/// Controller end of a virtual serial connection
///
/// Control-line changes and input flushes are recorded on the radio so
/// tests can check the line discipline.
#[derive(Debug)]
pub struct VirtualPort {
    stream: DuplexStream,
    radio: RadioHandle,
}

impl CatTransport for VirtualPort {
    fn set_control_lines(&mut self, asserted: bool) -> io::Result<()> {
        self.radio.lock().record_control_lines(asserted);
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.radio.lock().record_input_clear();
        Ok(())
    }
}

impl AsyncRead for VirtualPort {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for VirtualPort {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
