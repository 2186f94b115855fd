//! Prints inbound messages.

use std::io::{self, Write};

use bytes::{Bytes, BytesMut};
use hermes_client::{HandlerResult, WebSocketEvent};
use parking_lot::Mutex;
use tracing::debug;

/// Writes every complete inbound message as one line.
///
/// Chunks are buffered until the final chunk of a message arrives. Binary
/// payloads are printed lossily as UTF-8.
pub struct MessagePrinter<W> {
    state: Mutex<PrinterState<W>>,
}

struct PrinterState<W> {
    out: W,
    pending: BytesMut,
}

impl<W> MessagePrinter<W>
where
    W: Write + Send + 'static,
{
    /// Create a printer writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(PrinterState {
                out,
                pending: BytesMut::new(),
            }),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.state.into_inner().out
    }
}

impl MessagePrinter<io::Stdout> {
    /// Create a printer writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W> WebSocketEvent for MessagePrinter<W>
where
    W: Write + Send + 'static,
{
    fn on_data(&self, is_final: bool, payload: Bytes) -> HandlerResult {
        let mut state = self.state.lock();
        state.pending.extend_from_slice(&payload);
        if !is_final {
            return Ok(());
        }

        let message = state.pending.split();
        writeln!(state.out, "{}", String::from_utf8_lossy(&message))?;
        state.out.flush()?;
        Ok(())
    }

    fn on_pong(&self, _is_final: bool, payload: Bytes) -> HandlerResult {
        debug!(len = payload.len(), "Pong received");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prints_complete_messages() {
        let printer = MessagePrinter::new(Vec::new());
        printer.on_data(false, Bytes::from_static(b"hel")).unwrap();
        printer.on_data(true, Bytes::from_static(b"lo")).unwrap();
        printer.on_data(true, Bytes::from_static(b"second")).unwrap();

        assert_eq!(printer.into_inner(), b"hello\nsecond\n");
    }

    #[test]
    fn test_partial_message_not_printed() {
        let printer = MessagePrinter::new(Vec::new());
        printer.on_data(false, Bytes::from_static(b"pending")).unwrap();
        assert!(printer.into_inner().is_empty());
    }

    #[test]
    fn test_binary_printed_lossily() {
        let printer = MessagePrinter::new(Vec::new());
        printer.on_data(true, Bytes::from_static(&[0x66, 0xFF])).unwrap();
        assert_eq!(printer.into_inner(), "f\u{FFFD}\n".as_bytes());
    }
}
