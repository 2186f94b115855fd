//! `Sec-WebSocket-Key` / `Sec-WebSocket-Accept` derivation (RFC 6455 §4.2.1).

use base64::Engine;
use rand::Rng;
use sha1::{Digest, Sha1};

/// The WebSocket magic GUID used in the handshake.
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Header carrying the client nonce.
pub const SEC_WEBSOCKET_KEY: &str = "Sec-WebSocket-Key";

/// Header carrying the server's proof of the nonce.
pub const SEC_WEBSOCKET_ACCEPT: &str = "Sec-WebSocket-Accept";

/// Nonce length mandated by the RFC.
pub const DEFAULT_KEY_LEN: usize = 16;

/// Generates a base64-encoded 16-byte nonce.
pub fn generate_key() -> String {
    generate_key_with_len(DEFAULT_KEY_LEN)
}

/// Generates a base64-encoded nonce of `len` bytes.
///
/// Bytes are drawn from the printable range `[32, 126]`.
pub fn generate_key_with_len(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let data: Vec<u8> = (0..len).map(|_| rng.gen_range(32..=126)).collect();
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Computes the `Sec-WebSocket-Accept` value for a given key.
pub fn compute_accept(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    let result = hasher.finalize();
    base64::engine::general_purpose::STANDARD.encode(result)
}
