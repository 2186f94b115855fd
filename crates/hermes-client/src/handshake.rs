//! HTTP upgrade handshake.
//!
//! The request carries the caller's extra headers followed by the headers
//! the protocol requires. Response validation is deliberately lenient: each
//! required line is searched for anywhere in the response head, ignoring
//! header-name case and order.

use bytes::{Buf, Bytes, BytesMut};
use hermes_codec::handshake::{SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY};
use hermes_codec::compute_accept;
use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::{ClientConfig, Target};
use crate::error::{WsError, WsResult};
use crate::io::{ConnectionIo, WriteBatch};

/// WebSocket protocol version sent in `Sec-WebSocket-Version`.
pub const WEBSOCKET_VERSION: &str = "13";

/// Largest accepted response head.
pub const MAX_RESPONSE_HEAD: usize = 16 * 1024;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Headers for the upgrade request, in send order.
///
/// Required headers replace any caller header of the same name.
pub fn request_headers(config: &ClientConfig, target: &Target, key: &str) -> IndexMap<String, String> {
    let forced = [
        ("Connection", "Upgrade".to_string()),
        ("Upgrade", "websocket".to_string()),
        ("Sec-WebSocket-Version", WEBSOCKET_VERSION.to_string()),
        ("Host", target.host_header()),
        (SEC_WEBSOCKET_KEY, key.to_string()),
    ];

    let mut headers: IndexMap<String, String> = config
        .headers
        .iter()
        .filter(|(name, _)| !forced.iter().any(|(f, _)| f.eq_ignore_ascii_case(name)))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    for (name, value) in forced {
        headers.insert(name.to_string(), value);
    }
    headers
}

/// Build the upgrade request.
pub fn build_request(config: &ClientConfig, target: &Target, key: &str) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch.line(&format!("GET {} {}", target.path, config.http_version));
    for (name, value) in request_headers(config, target, key) {
        batch.line(&format!("{name}: {value}"));
    }
    batch.blank_line();
    batch
}

/// Read the response head.
///
/// Returns the head (without the terminating blank line) and any bytes the
/// server sent after it, which belong to the first frame.
pub async fn read_response(io: &ConnectionIo, max_read: usize) -> WsResult<(String, Bytes)> {
    let mut buf = BytesMut::new();

    loop {
        if let Some(end) = find_terminator(&buf) {
            let head = buf.split_to(end);
            buf.advance(HEAD_TERMINATOR.len());
            let head = String::from_utf8_lossy(&head).into_owned();
            return Ok((head, buf.freeze()));
        }

        if buf.len() > MAX_RESPONSE_HEAD {
            return Err(WsError::handshake_failed(format!(
                "response head exceeds {MAX_RESPONSE_HEAD} bytes"
            )));
        }

        let chunk = io.read(max_read).await?;
        if chunk.is_empty() {
            return Err(WsError::handshake_failed(
                "connection closed before the upgrade response completed",
            ));
        }
        buf.extend_from_slice(&chunk);
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
}

/// Check that `response` accepts the upgrade requested with `key`.
///
/// Fails with [`WsError::HandshakeFailed`] naming every missing line.
pub fn validate_response(response: &str, http_version: &str, key: &str) -> WsResult<()> {
    let accept = compute_accept(key);
    let required = [
        ("101 status line", format!(r"(?i){}\s+101", regex::escape(http_version))),
        (
            SEC_WEBSOCKET_ACCEPT,
            format!(
                r"(?i:{}):[ \t]*{}",
                regex::escape(SEC_WEBSOCKET_ACCEPT),
                regex::escape(&accept)
            ),
        ),
        ("Connection: Upgrade", r"(?i)Connection:[^\r\n]*\bUpgrade\b".to_string()),
        ("Upgrade: websocket", r"(?i)Upgrade:[ \t]*websocket\b".to_string()),
    ];

    let mut missing = Vec::new();
    for (name, pattern) in &required {
        let re = Regex::new(pattern)
            .map_err(|e| WsError::handshake_failed(format!("invalid pattern for {name}: {e}")))?;
        if !re.is_match(response) {
            missing.push(*name);
        }
    }

    if missing.is_empty() {
        debug!("Upgrade response accepted");
        Ok(())
    } else {
        warn!(missing = ?missing, "Upgrade response rejected");
        Err(WsError::handshake_failed(format!(
            "missing {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    fn response() -> String {
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
            .to_string()
    }

    fn target() -> Target {
        Target::parse("ws://example.com:9001/chat?x=1").unwrap()
    }

    #[test]
    fn test_request_layout() {
        let config = ClientConfig::new("ws://example.com:9001/chat?x=1")
            .with_header("Authorization", "Bearer t");
        let batch = build_request(&config, &target(), KEY);
        let text = std::str::from_utf8(batch.as_bytes()).unwrap();

        assert!(text.starts_with("GET /chat?x=1 HTTP/1.1\r\n"));
        assert!(text.contains("\r\nUser-Agent: hermes/"));
        assert!(text.contains("\r\nAuthorization: Bearer t\r\n"));
        assert!(text.contains("\r\nConnection: Upgrade\r\n"));
        assert!(text.contains("\r\nUpgrade: websocket\r\n"));
        assert!(text.contains("\r\nSec-WebSocket-Version: 13\r\n"));
        assert!(text.contains("\r\nHost: example.com:9001\r\n"));
        assert!(text.contains(&format!("\r\nSec-WebSocket-Key: {KEY}\r\n")));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_forced_headers_override_caller() {
        let config = ClientConfig::default()
            .with_header("host", "spoofed")
            .with_header("X-Trace", "1");
        let headers = request_headers(&config, &target(), KEY);

        assert!(headers.get("host").is_none());
        assert_eq!(headers.get("Host").map(String::as_str), Some("example.com:9001"));
        let names: Vec<&str> = headers.keys().map(String::as_str).collect();
        assert_eq!(names.first().copied(), Some("User-Agent"));
        assert_eq!(names.last().copied(), Some("Sec-WebSocket-Key"));
    }

    #[test]
    fn test_validate_accepts_canonical_response() {
        assert!(validate_response(&response(), "HTTP/1.1", KEY).is_ok());
    }

    #[test]
    fn test_validate_is_case_insensitive_for_names() {
        let response = response()
            .replace("Upgrade: websocket", "upgrade: WebSocket")
            .replace("Connection: Upgrade", "connection: keep-alive, upgrade")
            .replace("Sec-WebSocket-Accept", "sec-websocket-accept");
        assert!(validate_response(&response, "HTTP/1.1", KEY).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_accept() {
        let response = response().replace("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=", "bogus");
        let err = validate_response(&response, "HTTP/1.1", KEY).unwrap_err();
        assert!(matches!(&err, WsError::HandshakeFailed(msg) if msg.contains(SEC_WEBSOCKET_ACCEPT)));
    }

    #[test]
    fn test_validate_lists_all_missing_lines() {
        let err = validate_response("HTTP/1.1 200 OK", "HTTP/1.1", KEY).unwrap_err();
        let WsError::HandshakeFailed(msg) = err else {
            panic!("expected HandshakeFailed");
        };
        assert!(msg.contains("101 status line"));
        assert!(msg.contains("Connection: Upgrade"));
        assert!(msg.contains("Upgrade: websocket"));
    }

    #[test]
    fn test_validate_uses_configured_version() {
        assert!(validate_response(&response(), "HTTP/1.0", KEY).is_err());
    }

    #[tokio::test]
    async fn test_read_response_keeps_leftover() {
        let (client, mut server) = tokio::io::duplex(1024);
        let io = ConnectionIo::new(Box::new(client));

        server
            .write_all(b"HTTP/1.1 101 OK\r\nUpgrade: websocket\r\n\r\n\x81\x02hi")
            .await
            .unwrap();

        let (head, leftover) = read_response(&io, 7).await.unwrap();
        assert_eq!(head, "HTTP/1.1 101 OK\r\nUpgrade: websocket");

        // The read that completed the head stopped partway into the frame.
        assert!(b"\x81\x02hi".starts_with(&leftover));
        let mut frame = leftover.to_vec();
        while frame.len() < 4 {
            let chunk = io.read(7).await.unwrap();
            assert!(!chunk.is_empty());
            frame.extend_from_slice(&chunk);
        }
        assert_eq!(frame, b"\x81\x02hi");
    }

    #[tokio::test]
    async fn test_exchange_over_scripted_transport() {
        let config = ClientConfig::new("ws://example.com:9001/chat?x=1");
        let request = build_request(&config, &target(), KEY);
        let mock = tokio_test::io::Builder::new()
            .write(request.as_bytes())
            .read(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n")
            .read(b"Connection: Upgrade\r\n")
            .read(b"Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n")
            .build();
        let io = ConnectionIo::new(Box::new(mock));

        io.commit(&request).await.unwrap();
        let (head, leftover) = read_response(&io, 1024).await.unwrap();

        assert!(leftover.is_empty());
        assert!(validate_response(&head, "HTTP/1.1", KEY).is_ok());
    }

    #[tokio::test]
    async fn test_read_response_fails_on_eof() {
        let (client, mut server) = tokio::io::duplex(1024);
        let io = ConnectionIo::new(Box::new(client));

        server.write_all(b"HTTP/1.1 101").await.unwrap();
        drop(server);

        let err = read_response(&io, 64).await.unwrap_err();
        assert!(matches!(err, WsError::HandshakeFailed(_)));
    }
}
