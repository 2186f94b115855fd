//! Ordered event dispatch.
//!
//! The receive loop pushes [`InboundEvent`]s into an unbounded channel. A
//! single dispatcher task per connection drains it, invoking the handler one
//! event at a time so delivery order matches arrival order. The dispatcher
//! alone owns the ping accumulator.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use hermes_codec::OpCode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn, Instrument};

use crate::event::WebSocketEvent;
use crate::sender::FrameSender;

/// Callback an inbound chunk is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Text, Binary or Continuation payload.
    Data,
    /// Ping payload.
    Ping,
    /// Pong payload.
    Pong,
}

impl EventKind {
    /// Route for a frame opcode.
    pub fn for_opcode(opcode: OpCode) -> Self {
        match opcode {
            OpCode::Ping => Self::Ping,
            OpCode::Pong => Self::Pong,
            _ => Self::Data,
        }
    }
}

/// One payload chunk waiting for delivery.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Target callback.
    pub kind: EventKind,
    /// Whether this chunk completes its message.
    pub is_final: bool,
    /// Unmasked payload bytes.
    pub payload: Bytes,
}

pub(crate) struct Dispatcher {
    handler: Arc<dyn WebSocketEvent>,
    sender: FrameSender,
    auto_pong: bool,
    ping_buffer: BytesMut,
}

impl Dispatcher {
    pub(crate) fn new(handler: Arc<dyn WebSocketEvent>, sender: FrameSender, auto_pong: bool) -> Self {
        Self {
            handler,
            sender,
            auto_pong,
            ping_buffer: BytesMut::new(),
        }
    }

    /// Start draining `events` on a new task.
    pub(crate) fn spawn(self, events: mpsc::UnboundedReceiver<InboundEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events).in_current_span())
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<InboundEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("Event dispatcher stopped");
    }

    async fn handle(&mut self, event: InboundEvent) {
        let InboundEvent {
            kind,
            is_final,
            payload,
        } = event;

        self.invoke(kind, is_final, payload.clone()).await;

        if kind == EventKind::Ping && self.auto_pong {
            self.ping_buffer.extend_from_slice(&payload);
            if is_final {
                let reply = self.ping_buffer.split().freeze();
                if let Err(e) = self.sender.send(OpCode::Pong, reply).await {
                    warn!(error = %e, "Failed to answer ping");
                }
            }
        }
    }

    async fn invoke(&self, kind: EventKind, is_final: bool, payload: Bytes) {
        let handler = Arc::clone(&self.handler);
        let outcome = tokio::task::spawn_blocking(move || match kind {
            EventKind::Data => handler.on_data(is_final, payload),
            EventKind::Ping => handler.on_ping(is_final, payload),
            EventKind::Pong => handler.on_pong(is_final, payload),
        })
        .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(kind = ?kind, error = %e, "Event handler returned an error"),
            Err(e) if e.is_panic() => error!(kind = ?kind, "Event handler panicked"),
            Err(e) => warn!(kind = ?kind, error = %e, "Event handler was cancelled"),
        }
    }
}
