//! Serial transport abstraction
//!
//! Radios are reached through a [`CatTransport`]: an async byte stream that
//! can also drive the DTR/RTS lines and drop stale input. Real hardware is
//! a [`tokio_serial::SerialStream`]; tests and the simulator plug in
//! in-memory streams through a [`PortOpener`].

use std::io;
use std::time::Duration;

use cat_protocol::RadioModel;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::time::{timeout, timeout_at, Instant};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};
use tracing::{debug, trace};

/// Size of the scratch buffer used for each read call
const READ_CHUNK: usize = 64;

/// Settings used when opening a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    /// Line speed
    pub baud_rate: u32,
    /// Driver-level timeout for blocking reads and writes
    pub timeout: Duration,
}

impl PortSettings {
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self { baud_rate, timeout }
    }
}

/// A byte stream to a radio
pub trait CatTransport: AsyncRead + AsyncWrite + Unpin + Send {
    /// Drive DTR and RTS together
    fn set_control_lines(&mut self, asserted: bool) -> io::Result<()>;

    /// Discard bytes received but not yet read
    fn clear_input(&mut self) -> io::Result<()>;
}

impl CatTransport for SerialStream {
    fn set_control_lines(&mut self, asserted: bool) -> io::Result<()> {
        self.write_data_terminal_ready(asserted)?;
        self.write_request_to_send(asserted)?;
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

/// In-memory streams have no control lines and nothing buffered outside the pipe
impl CatTransport for DuplexStream {
    fn set_control_lines(&mut self, _asserted: bool) -> io::Result<()> {
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens transports by port name
pub trait PortOpener: Send + Sync + 'static {
    type Transport: CatTransport + 'static;

    /// Open `port` with the given settings
    fn open(&self, port: &str, settings: &PortSettings) -> io::Result<Self::Transport>;
}

/// Opens real serial ports: 8 data bits, no parity, 1 stop bit, no flow control
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl PortOpener for SerialOpener {
    type Transport = SerialStream;

    fn open(&self, port: &str, settings: &PortSettings) -> io::Result<SerialStream> {
        debug!("Opening {} at {} baud", port, settings.baud_rate);

        #[allow(unused_mut)]
        let mut stream = tokio_serial::new(port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.timeout)
            .open_native_async()?;

        // Another program talking to the radio at the same time corrupts both sessions
        #[cfg(unix)]
        stream.set_exclusive(true)?;

        Ok(stream)
    }
}

/// Set DTR/RTS the way `model` expects
///
/// Must run before any traffic: some interfaces reset or key the radio on
/// a line change.
pub fn apply_control_lines<T>(transport: &mut T, model: &RadioModel) -> io::Result<()>
where
    T: CatTransport + ?Sized,
{
    let asserted = model.asserts_control_lines();
    debug!(
        model = model.name,
        dtr = asserted,
        rts = asserted,
        "Setting control lines"
    );
    transport.set_control_lines(asserted)
}

/// Write a command and flush it, bounded by `limit`
pub async fn write_command<T>(transport: &mut T, bytes: &[u8], limit: Duration) -> io::Result<()>
where
    T: AsyncWrite + Unpin + ?Sized,
{
    trace!("TX {:02X?}", bytes);
    timeout(limit, async {
        transport.write_all(bytes).await?;
        transport.flush().await
    })
    .await
    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write timed out"))?
}

/// Read a reply of at most `max_len` bytes
///
/// Stops as soon as `complete` accepts the bytes collected so far, when
/// `max_len` is reached, when the stream ends, or when `limit` elapses.
/// Whatever arrived before then is returned, possibly nothing; deciding
/// whether it is enough is up to the caller.
pub async fn read_reply<T, F>(
    transport: &mut T,
    max_len: usize,
    limit: Duration,
    complete: F,
) -> io::Result<Vec<u8>>
where
    T: AsyncRead + Unpin + ?Sized,
    F: Fn(&[u8]) -> bool,
{
    let deadline = Instant::now() + limit;
    let mut buffer = Vec::with_capacity(max_len);
    let mut chunk = [0u8; READ_CHUNK];

    while buffer.len() < max_len {
        let want = (max_len - buffer.len()).min(READ_CHUNK);
        match timeout_at(deadline, transport.read(&mut chunk[..want])).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                buffer.extend_from_slice(&chunk[..n]);
                if complete(&buffer) {
                    break;
                }
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => break,
            Ok(Err(e)) => return Err(e),
            Err(_) => break,
        }
    }

    trace!("RX {:02X?}", buffer);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cat_protocol::RadioDatabase;

    #[tokio::test]
    async fn test_read_reply_stops_at_completion() {
        let (mut client, mut radio) = tokio::io::duplex(256);
        radio.write_all(b"FA014074000;IF").await.unwrap();

        let reply = read_reply(&mut client, 128, Duration::from_secs(1), |b| b.contains(&b';'))
            .await
            .unwrap();
        assert!(reply.starts_with(b"FA014074000;"));
    }

    #[tokio::test]
    async fn test_read_reply_respects_max_len() {
        let (mut client, mut radio) = tokio::io::duplex(256);
        radio.write_all(&[0x11; 40]).await.unwrap();

        let reply = read_reply(&mut client, 28, Duration::from_secs(1), |_| false)
            .await
            .unwrap();
        assert_eq!(reply.len(), 28);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_reply_returns_partial_on_timeout() {
        let (mut client, mut radio) = tokio::io::duplex(256);
        radio.write_all(b"FA0140").await.unwrap();

        let reply = read_reply(&mut client, 128, Duration::from_millis(200), |b| b.contains(&b';'))
            .await
            .unwrap();
        assert_eq!(reply, b"FA0140");
    }

    #[tokio::test]
    async fn test_read_reply_on_closed_stream() {
        let (mut client, radio) = tokio::io::duplex(256);
        drop(radio);

        let reply = read_reply(&mut client, 128, Duration::from_secs(1), |_| false)
            .await
            .unwrap();
        assert!(reply.is_empty());
    }

    #[tokio::test]
    async fn test_write_command_flushes() {
        let (mut client, mut radio) = tokio::io::duplex(256);
        write_command(&mut client, b"IF;", Duration::from_secs(1))
            .await
            .unwrap();

        let mut buf = [0u8; 3];
        radio.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"IF;");
    }

    #[test]
    fn test_control_lines_follow_model() {
        struct Lines(Option<bool>);
        impl AsyncRead for Lines {
            fn poll_read(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::task::Poll::Ready(Ok(()))
            }
        }
        impl AsyncWrite for Lines {
            fn poll_write(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                buf: &[u8],
            ) -> std::task::Poll<io::Result<usize>> {
                std::task::Poll::Ready(Ok(buf.len()))
            }
            fn poll_flush(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::task::Poll::Ready(Ok(()))
            }
            fn poll_shutdown(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::task::Poll::Ready(Ok(()))
            }
        }
        impl CatTransport for Lines {
            fn set_control_lines(&mut self, asserted: bool) -> io::Result<()> {
                self.0 = Some(asserted);
                Ok(())
            }
            fn clear_input(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut port = Lines(None);
        apply_control_lines(&mut port, RadioDatabase::by_name("Yaesu FT-DX10").unwrap()).unwrap();
        assert_eq!(port.0, Some(false));

        apply_control_lines(&mut port, RadioDatabase::by_name("Icom IC-705").unwrap()).unwrap();
        assert_eq!(port.0, Some(true));
    }
}
