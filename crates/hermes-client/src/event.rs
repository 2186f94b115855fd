//! Inbound event callbacks.

use bytes::Bytes;
use tracing::info;

/// Result returned by event callbacks.
///
/// Errors are logged by the dispatcher and never close the connection.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Receives inbound frames.
///
/// Callbacks run on a blocking-capable worker, one at a time and in arrival
/// order, so they may block without stalling the receive loop. `is_final`
/// is true for the last chunk of a message; payloads are delivered
/// incrementally as chunks arrive.
///
/// Every method defaults to logging the event.
pub trait WebSocketEvent: Send + Sync + 'static {
    /// Called for Text, Binary and Continuation payload chunks.
    fn on_data(&self, is_final: bool, payload: Bytes) -> HandlerResult {
        info!(fin = is_final, len = payload.len(), "Data received");
        Ok(())
    }

    /// Called for Ping payload chunks, before any automatic Pong is sent.
    fn on_ping(&self, is_final: bool, payload: Bytes) -> HandlerResult {
        info!(fin = is_final, len = payload.len(), "Ping received");
        Ok(())
    }

    /// Called for Pong payload chunks.
    fn on_pong(&self, is_final: bool, payload: Bytes) -> HandlerResult {
        info!(fin = is_final, len = payload.len(), "Pong received");
        Ok(())
    }
}

/// Handler that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

impl WebSocketEvent for LoggingHandler {}
