//! Serial link to the light controller.
//!
//! A single task owns the duplex stream. Outbound commands arrive over an
//! mpsc queue and are written one at a time; inbound bytes are split into
//! lines and forwarded as [`LinkEvent`]s in arrival order. There is no
//! reconnect: once the stream fails or closes, every later write reports
//! [`TransportError::Closed`].

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_serial::SerialStream;
use tokio_util::codec::{Decoder, Encoder, Framed};

use lightctl_protocol::{decode_line, encode_command, Command, LineDelimiter};

/// Error type for serial link operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The serial device could not be opened.
    #[error("Failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// Reading or writing the stream failed.
    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link task is gone.
    #[error("Serial link closed")]
    Closed,
}

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub path: String,
    pub baud_rate: u32,
    pub delimiter: LineDelimiter,
}

/// Open the serial device as an async byte stream.
pub fn open_serial(settings: &SerialSettings) -> Result<SerialStream, TransportError> {
    let builder = tokio_serial::new(settings.path.as_str(), settings.baud_rate);
    SerialStream::open(&builder).map_err(|source| TransportError::Open {
        path: settings.path.clone(),
        source,
    })
}

/// Line framing for the serial stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec {
    delimiter: LineDelimiter,
}

impl LineCodec {
    pub fn new(delimiter: LineDelimiter) -> Self {
        Self { delimiter }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, TransportError> {
        // Overlong input is consumed by `decode_line`; keep the stream alive
        // and go on with whatever follows it.
        loop {
            match decode_line(src, self.delimiter) {
                Ok(line) => return Ok(line),
                Err(e) => warn!("Discarding serial input: {}", e),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, TransportError> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                if !src.is_empty() {
                    debug!("Dropping {} bytes of unterminated input at EOF", src.len());
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Command> for LineCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), TransportError> {
        dst.extend_from_slice(&encode_command(&item));
        Ok(())
    }
}

/// Events emitted by the link task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The stream is ready.
    Opened,
    /// One inbound line, delimiter stripped.
    Line(String),
    /// The stream failed; the link closes right after.
    Error(String),
    /// The stream ended.
    Closed,
}

struct LinkRequest {
    command: Command,
    done: oneshot::Sender<Result<(), TransportError>>,
}

/// Cloneable handle for writing commands to the link.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    tx: mpsc::Sender<LinkRequest>,
}

impl std::fmt::Debug for LinkRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkRequest")
            .field("command", &self.command)
            .finish()
    }
}

impl LinkHandle {
    /// A handle with no link behind it. Every write fails with
    /// [`TransportError::Closed`].
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }

    /// Write one command, resolving once it has been flushed or has failed.
    pub async fn send(&self, command: Command) -> Result<(), TransportError> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(LinkRequest { command, done })
            .await
            .map_err(|_| TransportError::Closed)?;
        rx.await.map_err(|_| TransportError::Closed)?
    }

    /// Whether the link task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Start the link task on an open stream.
pub fn spawn_link<T>(io: T, delimiter: LineDelimiter) -> (LinkHandle, mpsc::Receiver<LinkEvent>)
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (req_tx, req_rx) = mpsc::channel(32);
    let (event_tx, event_rx) = mpsc::channel(64);
    let framed = Framed::new(io, LineCodec::new(delimiter));

    tokio::spawn(link_loop(framed, req_rx, event_tx));

    (LinkHandle { tx: req_tx }, event_rx)
}

async fn link_loop<T>(
    framed: Framed<T, LineCodec>,
    mut req_rx: mpsc::Receiver<LinkRequest>,
    event_tx: mpsc::Sender<LinkEvent>,
) where
    T: AsyncRead + AsyncWrite,
{
    let (mut sink, mut stream) = framed.split::<Command>();

    let _ = event_tx.send(LinkEvent::Opened).await;

    loop {
        tokio::select! {
            Some(req) = req_rx.recv() => {
                trace!("Writing command: {}", req.command);
                let result = sink.send(req.command).await;
                if req.done.send(result).is_err() {
                    debug!("Command sender went away before write completed");
                }
            }

            item = stream.next() => match item {
                Some(Ok(line)) => {
                    if event_tx.send(LinkEvent::Line(line)).await.is_err() {
                        debug!("Event receiver dropped, stopping link");
                        break;
                    }
                }
                Some(Err(e)) => {
                    debug!("Serial link error: {}", e);
                    let _ = event_tx.send(LinkEvent::Error(e.to_string())).await;
                    break;
                }
                None => {
                    debug!("Serial stream ended");
                    break;
                }
            }
        }
    }

    let _ = event_tx.send(LinkEvent::Closed).await;
}
