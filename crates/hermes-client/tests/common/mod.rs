//! Scripted server side for engine tests.

#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use hermes_client::{EventKind, HandlerResult, WebSocketEvent};
use hermes_codec::{compute_accept, Frame, OpCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

/// An event observed by [`ChannelHandler`].
pub type Observed = (EventKind, bool, Bytes);

/// Server end of an in-memory connection.
pub struct FakeServer {
    stream: DuplexStream,
    buf: Vec<u8>,
}

/// Creates a connected client stream and fake server.
pub fn pair() -> (DuplexStream, FakeServer) {
    let (client, server) = tokio::io::duplex(256 * 1024);
    (
        client,
        FakeServer {
            stream: server,
            buf: Vec::new(),
        },
    )
}

impl FakeServer {
    /// Reads the upgrade request head.
    pub async fn read_request(&mut self) -> String {
        loop {
            if let Some(pos) = self.buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head: Vec<u8> = self.buf.drain(..pos + 4).collect();
                return String::from_utf8(head).unwrap();
            }
            assert!(self.fill().await, "client closed during handshake");
        }
    }

    /// Accepts the upgrade and returns the request head.
    pub async fn accept(&mut self) -> String {
        self.accept_with(&[]).await
    }

    /// Accepts the upgrade, writing `extra` in the same write as the
    /// response head.
    pub async fn accept_with(&mut self, extra: &[u8]) -> String {
        let request = self.read_request().await;
        let key = header(&request, "Sec-WebSocket-Key");
        let mut response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\r\n",
            compute_accept(&key)
        )
        .into_bytes();
        response.extend_from_slice(extra);
        self.write(&response).await;
        request
    }

    /// Writes raw bytes.
    pub async fn write(&mut self, data: &[u8]) {
        self.stream.write_all(data).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Writes an unmasked server frame.
    pub async fn send_frame(&mut self, opcode: OpCode, fin: bool, payload: &[u8]) {
        self.write(&server_frame(opcode, fin, payload)).await;
    }

    /// Reads the next complete client frame.
    pub async fn read_frame(&mut self) -> Frame {
        loop {
            if let Ok(frame) = Frame::decode(&self.buf) {
                if frame.payload().len() as u64 == frame.payload_length() {
                    self.buf.drain(..frame.consumed());
                    return frame;
                }
            }
            assert!(self.fill().await, "client closed before sending a frame");
        }
    }

    /// Reads until the client closes its end and returns every complete
    /// frame received.
    pub async fn frames_until_closed(&mut self) -> Vec<Frame> {
        while self.fill().await {}
        let mut frames = Vec::new();
        while let Ok(frame) = Frame::decode(&self.buf) {
            if frame.payload().len() as u64 != frame.payload_length() {
                break;
            }
            self.buf.drain(..frame.consumed());
            frames.push(frame);
        }
        frames
    }

    /// Whether the client has closed its end, discarding any bytes read.
    pub async fn closed(&mut self) -> bool {
        loop {
            if !self.fill().await {
                return true;
            }
        }
    }

    async fn fill(&mut self) -> bool {
        let mut chunk = [0u8; 4096];
        match self.stream.read(&mut chunk).await {
            Ok(0) | Err(_) => false,
            Ok(n) => {
                self.buf.extend_from_slice(&chunk[..n]);
                true
            }
        }
    }
}

/// Returns the value of header `name` in a request head.
pub fn header(request: &str, name: &str) -> String {
    request
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(n, _)| n.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim().to_string())
        .unwrap_or_else(|| panic!("missing header {name}"))
}

/// Encodes an unmasked frame as a server would send it.
pub fn server_frame(opcode: OpCode, fin: bool, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![(u8::from(fin) << 7) | opcode.value()];
    let len = payload.len();
    if len <= 125 {
        out.push(len as u8);
    } else if let Ok(short) = u16::try_from(len) {
        out.push(126);
        out.extend_from_slice(&short.to_be_bytes());
    } else {
        out.push(127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// Forwards every callback to a channel. Panics on a `panic` payload and
/// fails on a `fail` payload.
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<Observed>,
}

/// Creates a [`ChannelHandler`] and the receiving end of its channel.
pub fn channel_handler() -> (ChannelHandler, mpsc::UnboundedReceiver<Observed>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelHandler { tx }, rx)
}

impl ChannelHandler {
    fn record(&self, kind: EventKind, is_final: bool, payload: Bytes) -> HandlerResult {
        match payload.as_ref() {
            b"panic" => panic!("handler asked to panic"),
            b"fail" => Err("handler asked to fail".into()),
            _ => {
                let _ = self.tx.send((kind, is_final, payload));
                Ok(())
            }
        }
    }
}

impl WebSocketEvent for ChannelHandler {
    fn on_data(&self, is_final: bool, payload: Bytes) -> HandlerResult {
        self.record(EventKind::Data, is_final, payload)
    }

    fn on_ping(&self, is_final: bool, payload: Bytes) -> HandlerResult {
        self.record(EventKind::Ping, is_final, payload)
    }

    fn on_pong(&self, is_final: bool, payload: Bytes) -> HandlerResult {
        self.record(EventKind::Pong, is_final, payload)
    }
}

/// Drains every event currently queued.
pub fn drain(events: &mut mpsc::UnboundedReceiver<Observed>) -> Vec<Observed> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Fails the test if `future` takes longer than five seconds.
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}
