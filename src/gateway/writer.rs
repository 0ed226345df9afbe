//! Single writer for the caller event stream.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::events::BridgeEvent;

/// Spawn the task that owns `output`.
///
/// Each event becomes one line and is flushed immediately. The task ends when
/// every [`EventSink`](crate::core::events::EventSink) is dropped or the
/// output fails.
pub fn spawn_writer<W>(
    mut output: W,
    mut events: mpsc::UnboundedReceiver<BridgeEvent>,
) -> JoinHandle<io::Result<u64>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut written = 0u64;
        while let Some(event) = events.recv().await {
            let mut line = match event.to_line() {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            line.push('\n');

            output.write_all(line.as_bytes()).await?;
            output.flush().await?;
            written += 1;
        }
        output.shutdown().await?;
        Ok(written)
    })
}
