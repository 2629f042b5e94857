//! Virtual radio connection task
//!
//! One task runs per open connection. It reads CAT bytes from its end of
//! the stream, feeds them to the shared [`VirtualRadio`] state and writes
//! the replies back. The task ends when the controller hangs up.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::radio::RadioHandle;

/// Run one connection to a virtual radio at `baud`
///
/// [`VirtualRadio`](crate::VirtualRadio) only answers when `baud` matches
/// its configured rate, just as a real radio hears noise at the wrong speed.
pub async fn run_virtual_radio_task<S>(mut stream: S, radio: RadioHandle, baud: u32) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let name = radio.lock().model().name;
    let mut buf = [0u8; 256];
    let mut pending = Vec::new();

    info!("Starting virtual radio task for {} at {} baud", name, baud);

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => {
                debug!("Virtual radio stream closed for {}", name);
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Virtual radio {} stream error: {}", name, e);
                return Err(e);
            }
        };

        pending.extend_from_slice(&buf[..n]);
        let (reply, delay) = {
            let mut radio = radio.lock();
            (radio.process(&mut pending, baud), radio.reply_delay())
        };

        if reply.is_empty() {
            continue;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        debug!("Virtual radio {} replying {:02X?}", name, reply);
        stream.write_all(&reply).await?;
        stream.flush().await?;
    }

    info!("Virtual radio task ended for {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VirtualRadio;
    use std::time::Duration;

    #[tokio::test]
    async fn test_task_answers_frequency_query() {
        let (mut controller, radio_end) = tokio::io::duplex(1024);
        let radio = RadioHandle::new(VirtualRadio::new("Kenwood TS-590").unwrap());
        let task = tokio::spawn(run_virtual_radio_task(radio_end, radio.clone(), 115200));

        controller.write_all(b"FA;").await.unwrap();
        let mut reply = [0u8; 12];
        tokio::time::timeout(Duration::from_millis(100), controller.read_exact(&mut reply))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&reply, b"FA014250000;");
        assert_eq!(radio.lock().received().len(), 1);

        drop(controller);
        let result = tokio::time::timeout(Duration::from_millis(100), task)
            .await
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_task_silent_at_wrong_baud() {
        let (mut controller, radio_end) = tokio::io::duplex(1024);
        let radio = RadioHandle::new(VirtualRadio::new("Icom IC-7300").unwrap());
        tokio::spawn(run_virtual_radio_task(radio_end, radio, 9600));

        controller
            .write_all(&cat_protocol::icom::encode_read_frequency(0x94))
            .await
            .unwrap();
        let mut reply = [0u8; 1];
        let result =
            tokio::time::timeout(Duration::from_millis(50), controller.read(&mut reply)).await;
        assert!(result.is_err(), "radio answered at the wrong baud");
    }
}
