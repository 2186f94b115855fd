//! Wire-level building blocks for the Hermes WebSocket client.
//!
//! This crate is pure: it never touches a socket. It provides
//!
//! - [`bits`] - byte-level bit manipulation used by the header codec
//! - [`frame`] - RFC 6455 frame decoding, encoding and masking
//! - [`handshake`] - `Sec-WebSocket-Key` generation and `Sec-WebSocket-Accept` derivation
//!
//! # Example
//!
//! ```
//! use hermes_codec::{Frame, MessageEncoder, OpCode};
//!
//! let mut encoder = MessageEncoder::new(OpCode::Text);
//! let wire = encoder.encode(true, b"hello");
//!
//! let frame = Frame::decode(&wire)?;
//! assert_eq!(frame.opcode(), OpCode::Text);
//! assert_eq!(frame.payload().as_ref(), b"hello");
//! # Ok::<(), hermes_codec::CodecError>(())
//! ```

pub mod bits;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod opcode;

pub use error::{CodecError, CodecResult};
pub use frame::{apply_mask, encode, generate_mask, header_len, Frame, MessageEncoder, MAX_HEADER_LEN};
pub use handshake::{compute_accept, generate_key, generate_key_with_len, WEBSOCKET_GUID};
pub use opcode::OpCode;
