//! Outbound message path.
//!
//! Payloads are split into frames of at most `max_frame_size` bytes. A
//! message lock keeps the frames of concurrent data messages from
//! interleaving; each frame is committed as one batch.

use std::sync::Arc;

use bytes::Bytes;
use hermes_codec::{MessageEncoder, OpCode};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::WsResult;
use crate::io::{ConnectionIo, WriteBatch};

/// Sends framed messages over a connection.
#[derive(Clone)]
pub struct FrameSender {
    io: Arc<ConnectionIo>,
    message_lock: Arc<Mutex<()>>,
    max_frame_size: usize,
}

impl FrameSender {
    pub(crate) fn new(io: Arc<ConnectionIo>, max_frame_size: usize) -> Self {
        Self {
            io,
            message_lock: Arc::new(Mutex::new(())),
            max_frame_size: max_frame_size.max(1),
        }
    }

    /// Send `payload` as one message.
    ///
    /// An empty payload produces a single empty final frame. Control frames
    /// are never fragmented and skip the message lock so they can go out
    /// between the fragments of a long data message.
    pub async fn send(&self, opcode: OpCode, payload: Bytes) -> WsResult<()> {
        let mut encoder = MessageEncoder::new(opcode);

        if opcode.is_control() {
            return self.commit(encoder.encode(true, &payload), opcode).await;
        }

        let _guard = self.message_lock.lock().await;
        if payload.is_empty() {
            return self.commit(encoder.encode(true, &[]), opcode).await;
        }

        let mut chunks = payload.chunks(self.max_frame_size).peekable();
        while let Some(chunk) = chunks.next() {
            let fin = chunks.peek().is_none();
            self.commit(encoder.encode(fin, chunk), opcode).await?;
        }
        Ok(())
    }

    /// Send everything `reader` yields as one message.
    ///
    /// The reader is consumed one chunk ahead, so the last frame is marked
    /// final as soon as the source is exhausted.
    pub async fn send_reader<R>(&self, opcode: OpCode, mut reader: R) -> WsResult<()>
    where
        R: AsyncRead + Unpin,
    {
        let _guard = self.message_lock.lock().await;
        let mut encoder = MessageEncoder::new(opcode);

        let mut current = read_chunk(&mut reader, self.max_frame_size).await?;
        loop {
            let next = read_chunk(&mut reader, self.max_frame_size).await?;
            let fin = next.is_empty();
            self.commit(encoder.encode(fin, &current), opcode).await?;
            if fin {
                return Ok(());
            }
            current = next;
        }
    }

    async fn commit(&self, frame: Bytes, opcode: OpCode) -> WsResult<()> {
        let mut batch = WriteBatch::new();
        batch.bytes(&frame);
        self.io.commit(&batch).await?;
        trace!(opcode = %opcode, len = frame.len(), "Frame sent");
        Ok(())
    }
}

impl std::fmt::Debug for FrameSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSender")
            .field("max_frame_size", &self.max_frame_size)
            .finish_non_exhaustive()
    }
}

/// Read until `max` bytes are buffered or the source is exhausted.
async fn read_chunk<R>(reader: &mut R, max: usize) -> WsResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; max];
    let mut filled = 0;
    while filled < max {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}
