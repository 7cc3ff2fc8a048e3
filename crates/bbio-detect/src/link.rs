//! Byte link to the adapter
//!
//! The detection logic only needs a byte pipe with bounded reads. Real
//! adapters are reached through [`SerialLink`]; anything implementing
//! `AsyncRead + AsyncWrite` can be wrapped in a [`StreamLink`], and the
//! simulator provides its own implementation.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, trace};

use crate::error::DetectError;

/// Rate of the adapter's own USB CDC port (independent of the target rate)
pub const ADAPTER_LINK_BAUD: u32 = 115_200;

/// Read timeout used while draining stale bytes
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Upper bound on a single drain, a talking target never goes quiet
pub const DRAIN_LIMIT: Duration = Duration::from_millis(500);

/// A byte-oriented, exclusively owned link to the adapter
#[async_trait]
pub trait AdapterLink: Send {
    /// Read up to `max` bytes, waiting at most `timeout`
    ///
    /// Returns an empty buffer when nothing arrived in time. Never blocks
    /// past the timeout.
    async fn read(&mut self, max: usize, timeout: Duration) -> io::Result<Vec<u8>>;

    /// Write all bytes to the link
    async fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Discard everything currently buffered on the receive side
    ///
    /// Returns the number of bytes thrown away. Gives up after
    /// [`DRAIN_LIMIT`] even if bytes keep arriving.
    async fn drain(&mut self) -> io::Result<usize>;

    /// Close the link
    async fn close(&mut self) -> io::Result<()>;

    /// Name of the underlying port, for logging
    fn name(&self) -> &str;
}

/// [`AdapterLink`] over any async byte stream
pub struct StreamLink<S> {
    name: String,
    stream: S,
    buffer: Vec<u8>,
}

/// Link to an adapter on a local serial port
pub type SerialLink = StreamLink<SerialStream>;

impl<S> StreamLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an async stream
    pub fn new(name: impl Into<String>, stream: S) -> Self {
        Self {
            name: name.into(),
            stream,
            buffer: vec![0u8; 256],
        }
    }

    /// Unwrap the underlying stream
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl StreamLink<SerialStream> {
    /// Open the adapter on a serial port
    pub fn open(port_name: &str) -> Result<Self, DetectError> {
        debug!("Opening adapter on {} at {} baud", port_name, ADAPTER_LINK_BAUD);

        let stream = tokio_serial::new(port_name, ADAPTER_LINK_BAUD)
            .timeout(Duration::from_millis(100))
            .open_native_async()
            .map_err(|e| DetectError::OpenFailed {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self::new(port_name, stream))
    }
}

#[async_trait]
impl<S> AdapterLink for StreamLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(&mut self, max: usize, wait: Duration) -> io::Result<Vec<u8>> {
        if max > self.buffer.len() {
            self.buffer.resize(max, 0);
        }

        match timeout(wait, self.stream.read(&mut self.buffer[..max])).await {
            Ok(Ok(0)) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} closed", self.name),
            )),
            Ok(Ok(n)) => {
                trace!("{} <- {:02X?}", self.name, &self.buffer[..n]);
                Ok(self.buffer[..n].to_vec())
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(Vec::new()),
        }
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        trace!("{} -> {:02X?}", self.name, data);
        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    async fn drain(&mut self) -> io::Result<usize> {
        let max = self.buffer.len();
        let deadline = Instant::now() + DRAIN_LIMIT;
        let mut discarded = 0;
        while Instant::now() < deadline {
            let chunk = self.read(max, DRAIN_POLL).await?;
            if chunk.is_empty() {
                break;
            }
            discarded += chunk.len();
        }
        if discarded > 0 {
            trace!("{} drained {} bytes", self.name, discarded);
        }
        Ok(discarded)
    }

    async fn close(&mut self) -> io::Result<()> {
        debug!("Closing {}", self.name);
        self.stream.shutdown().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
