//! Async WebSocket client engine for Hermes.
//!
//! This crate drives client-side RFC 6455 connections on top of the
//! `hermes-codec` frame codec.
//!
//! # Features
//!
//! - **Upgrade handshake** with lenient, order-independent response checks
//! - **Chunked receive loop** that delivers payloads incrementally while
//!   tracking the masking offset across reads
//! - **Ordered event dispatch** on a per-connection task, isolated from
//!   handler errors and panics
//! - **Fragmented sends** bounded by a configurable maximum frame size
//! - **Keep-alive pings** and automatic pong replies
//! - **TLS** through `tokio-rustls` with `webpki-roots` trust anchors
//!
//! # Example
//!
//! ```ignore
//! use bytes::Bytes;
//! use hermes_client::{ClientConfig, HandlerResult, WebSocketEvent, WsClient};
//!
//! struct Printer;
//!
//! impl WebSocketEvent for Printer {
//!     fn on_data(&self, is_final: bool, payload: Bytes) -> HandlerResult {
//!         println!("{} (final: {is_final})", String::from_utf8_lossy(&payload));
//!         Ok(())
//!     }
//! }
//!
//! let config = ClientConfig::new("wss://echo.example.com/")
//!     .with_ping_interval(std::time::Duration::from_secs(30));
//! let client = WsClient::connect(config, Printer).await?;
//! let receiver = client.run_async();
//!
//! client.send_text("hello").await?;
//! client.disconnect().await?;
//! receiver.await??;
//! ```

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handshake;
pub mod io;
pub mod sender;
pub mod transport;

pub use config::{ClientConfig, Target, DEFAULT_HTTP_VERSION, DEFAULT_MAX_FRAME_SIZE};
pub use connection::{ConnectionId, ConnectionState, WsClient};
pub use dispatch::{EventKind, InboundEvent};
pub use error::{CloseCode, WsError, WsResult};
pub use event::{HandlerResult, LoggingHandler, WebSocketEvent};
pub use io::{ConnectionIo, WriteBatch};
pub use sender::FrameSender;
pub use transport::{BoxedTransport, TlsConnectorSupplier, Transport};

pub use hermes_codec::OpCode;
