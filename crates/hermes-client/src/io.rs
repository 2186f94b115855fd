//! Connection I/O.
//!
//! [`ConnectionIo`] owns the transport. Writes are staged in a
//! [`WriteBatch`] and committed under a single writer lock, so each batch
//! reaches the wire contiguously. Reads are serialized by a separate lock and
//! can be interrupted by [`ConnectionIo::close`].

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{watch, Mutex};
use tracing::{debug, trace};

use crate::error::{WsError, WsResult};
use crate::transport::BoxedTransport;

/// Upper bound on a single read buffer allocation.
const READ_BUFFER_LIMIT: usize = 64 * 1024;

/// Bytes staged for a single atomic write.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    buf: BytesMut,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text line terminated by CRLF.
    pub fn line(&mut self, line: &str) -> &mut Self {
        self.buf.extend_from_slice(line.as_bytes());
        self.blank_line()
    }

    /// Append a bare CRLF.
    pub fn blank_line(&mut self) -> &mut Self {
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    /// Append raw bytes.
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Number of staged bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The staged bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl From<Bytes> for WriteBatch {
    fn from(data: Bytes) -> Self {
        Self {
            buf: BytesMut::from(&data[..]),
        }
    }
}

/// Owns the transport of one connection.
pub struct ConnectionIo {
    reader: Mutex<ReadHalf<BoxedTransport>>,
    writer: Mutex<WriteHalf<BoxedTransport>>,
    alive: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl ConnectionIo {
    /// Wrap a connected transport.
    pub fn new(transport: BoxedTransport) -> Self {
        let (reader, writer) = tokio::io::split(transport);
        let (shutdown, _) = watch::channel(false);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            alive: AtomicBool::new(true),
            shutdown,
        }
    }

    /// Whether the transport is still usable.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Write and flush a batch.
    ///
    /// Fails with [`WsError::TransportUnavailable`] before writing anything
    /// if the transport has been closed.
    pub async fn commit(&self, batch: &WriteBatch) -> WsResult<()> {
        if !self.is_alive() {
            return Err(WsError::TransportUnavailable);
        }

        let mut writer = self.writer.lock().await;
        if !self.is_alive() {
            return Err(WsError::TransportUnavailable);
        }

        writer.write_all(batch.as_bytes()).await?;
        writer.flush().await?;
        trace!(len = batch.len(), "Batch committed");
        Ok(())
    }

    /// Read up to `max` bytes.
    ///
    /// Returns an empty buffer once the peer has closed the stream or
    /// [`close`](Self::close) has been called, including when `close` runs
    /// while this read is pending.
    pub async fn read(&self, max: usize) -> WsResult<Bytes> {
        if !self.is_alive() || max == 0 {
            return Ok(Bytes::new());
        }

        let mut shutdown = self.shutdown.subscribe();
        let mut reader = self.reader.lock().await;
        let mut buf = vec![0u8; max.min(READ_BUFFER_LIMIT)];

        tokio::select! {
            result = reader.read(&mut buf) => {
                let n = result?;
                if n == 0 {
                    debug!("Transport reached end of stream");
                    self.alive.store(false, Ordering::Release);
                    return Ok(Bytes::new());
                }
                buf.truncate(n);
                Ok(Bytes::from(buf))
            }
            _ = shutdown.wait_for(|closed| *closed) => Ok(Bytes::new()),
        }
    }

    /// Release the transport. Calling this more than once has no effect.
    pub async fn close(&self) {
        if self.shutdown.send_replace(true) {
            return;
        }
        self.alive.store(false, Ordering::Release);

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!(error = %e, "Transport shutdown failed");
        }
    }
}

impl std::fmt::Debug for ConnectionIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionIo")
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}
