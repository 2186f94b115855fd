//! # Hermes
//!
//! **Async WebSocket client for the Themis Platform**
//!
//! Hermes speaks the client side of RFC 6455:
//!
//! - **Bit-exact frame codec** with 7/16/64-bit lengths and offset-aware masking
//! - **Lenient upgrade handshake** over TCP or TLS
//! - **Incremental delivery** of payload chunks to an ordered event handler
//! - **Fragmented sends** bounded by a maximum frame size
//! - **Keep-alive pings** and automatic pong replies
//! - **Structured logs** through `tracing`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hermes::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging(&LogConfig::development())?;
//!
//!     let client = WsClient::connect(ClientConfig::new("ws://localhost:9001/"), LoggingHandler).await?;
//!     let receiver = client.run_async();
//!
//!     client.send_text("hello").await?;
//!     client.disconnect().await?;
//!     receiver.await??;
//!     Ok(())
//! }
//! ```
//!
//! ## Layout
//!
//! ```text
//! WsClient → FrameSender → ConnectionIo → transport
//! transport → ConnectionIo → Frame::decode → dispatcher → WebSocketEvent
//! ```

#![doc(html_root_url = "https://docs.rs/hermes/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export the wire codec
pub use hermes_codec as codec;

// Re-export the connection engine
pub use hermes_client as client;

// Re-export logging setup
pub use hermes_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use hermes::prelude::*;
/// ```
pub mod prelude {
    pub use hermes_codec::{CodecError, Frame, MessageEncoder, OpCode};

    pub use hermes_client::{
        ClientConfig, CloseCode, ConnectionId, ConnectionState, HandlerResult, LoggingHandler,
        TlsConnectorSupplier, WebSocketEvent, WsClient, WsError, WsResult,
    };

    pub use hermes_telemetry::{init_logging, LogConfig};
}
