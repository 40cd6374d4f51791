use anyhow::Result;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::host::protocol::{parse_inbound, InboundMessage, OutboundMessage};

/// Reads host messages line by line and forwards them to the processing module. Reaching the end
/// of the input means the host went away, the reader stops and drops its sender.
pub struct HostReader<R> {
    input: R,
    next: mpsc::Sender<InboundMessage>,
    shutdown: CancellationToken,
}

impl<R: AsyncBufRead + Unpin> HostReader<R> {
    pub fn new(input: R, next: mpsc::Sender<InboundMessage>, shutdown: CancellationToken) -> Self {
        Self {
            input,
            next,
            shutdown,
        }
    }

    /// Executes the reader loop.
    pub async fn run(self) -> Result<()> {
        let mut lines = LinesStream::new(self.input.lines());
        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                line = lines.next() => line,
            };

            let line = match line {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    error!("Failed to read from host {e:?}");
                    return Err(e.into());
                }
                None => {
                    info!("Host closed the input");
                    return Ok(());
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match parse_inbound(&line) {
                Ok(Some(message)) => {
                    debug!("Received {:?}", message);
                    self.next
                        .send(message)
                        .await
                        .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping illegal host message {line}: {e}"),
            }
        }
    }
}

/// Writes acknowledgements and status changes back to the host.
pub struct HostWriter<W> {
    output: W,
    receiver: mpsc::Receiver<OutboundMessage>,
}

impl<W: AsyncWrite + Unpin> HostWriter<W> {
    pub fn new(output: W, receiver: mpsc::Receiver<OutboundMessage>) -> Self {
        Self { output, receiver }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(message) = self.receiver.recv().await {
            let mut buffer = serde_json::to_vec(&message)?;
            buffer.push(b'\n');
            self.output.write_all(&buffer).await?;
            self.output.flush().await?;
        }
        Ok(())
    }
}
