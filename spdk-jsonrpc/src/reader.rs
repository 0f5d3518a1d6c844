use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::dispatcher::Inbound;
use crate::error::Error;
use crate::protocol::Decoder;

const READ_BUFFER_SIZE: usize = 8192;

/// Decode values off the read half until the stream ends or breaks, then tell
/// the dispatcher the connection is gone.
pub(crate) async fn read_loop<R>(mut reader: R, inbound: mpsc::Sender<Inbound>)
where
    R: AsyncRead + Unpin,
{
    let reason = read_values(&mut reader, &inbound).await;
    let _ = inbound.send(Inbound::Closed(reason)).await;
}

async fn read_values<R>(reader: &mut R, inbound: &mpsc::Sender<Inbound>) -> Option<Error>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = Decoder::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        loop {
            match decoder.decode() {
                Ok(Some(value)) => {
                    if inbound.send(Inbound::Value(value)).await.is_err() {
                        return None;
                    }
                }
                Ok(None) => break,
                // a broken stream position cannot be resynchronized
                Err(e) => return Some(e),
            }
        }

        match reader.read(&mut buf).await {
            Ok(0) => {
                if decoder.has_partial() {
                    warn!("connection closed in the middle of a response");
                } else {
                    debug!("connection closed by peer");
                }
                return None;
            }
            Ok(n) => decoder.feed(&buf[..n]),
            Err(e) => return Some(e.into()),
        }
    }
}
