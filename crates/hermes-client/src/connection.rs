//! WebSocket client connection.
//!
//! [`WsClient`] drives one connection: it performs the upgrade handshake,
//! runs the receive loop that reassembles frames read in arbitrary chunks,
//! sends framed messages, schedules keep-alive pings and tears everything
//! down on close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::{Buf, Bytes, BytesMut};
use hermes_codec::{header_len, Frame, OpCode};
use parking_lot::Mutex;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, trace, warn, Instrument, Span};
use uuid::Uuid;

use crate::config::{ClientConfig, Target};
use crate::dispatch::{Dispatcher, EventKind, InboundEvent};
use crate::error::{CloseCode, WsError, WsResult};
use crate::event::WebSocketEvent;
use crate::handshake;
use crate::io::ConnectionIo;
use crate::sender::FrameSender;
use crate::transport::{self, BoxedTransport, Transport};

/// A unique identifier for a WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new time-ordered connection ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a connection.
///
/// `Disconnected --connect--> Open --disconnect / Close frame / fatal error-->
/// Closing --transport released--> Closed`. A failed connect never yields a
/// client, leaving the attempt in `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport open, handshake in progress.
    Connecting,
    /// Handshake accepted.
    Open,
    /// Shutdown started.
    Closing,
    /// Transport released.
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A WebSocket client connection.
///
/// Cloning is cheap; clones share the same connection.
///
/// # Example
///
/// ```ignore
/// use hermes_client::{ClientConfig, LoggingHandler, WsClient};
///
/// let client = WsClient::connect(ClientConfig::new("ws://localhost:9001/"), LoggingHandler).await?;
/// let receiver = client.run_async();
///
/// client.send_text("hello").await?;
/// client.disconnect().await?;
/// receiver.await??;
/// ```
#[derive(Clone)]
pub struct WsClient {
    inner: Arc<Inner>,
}

struct Inner {
    id: ConnectionId,
    config: ClientConfig,
    target: Target,
    connected_at: Instant,
    span: Span,
    io: Arc<ConnectionIo>,
    sender: FrameSender,
    state: Mutex<ConnectionState>,
    running: AtomicBool,
    started: AtomicBool,
    close_sent: AtomicBool,
    leftover: Mutex<Bytes>,
    events: Mutex<Option<mpsc::UnboundedSender<InboundEvent>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    ping_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.ping_task.get_mut().take() {
            task.abort();
        }
        if let Some(task) = self.dispatcher.get_mut().take() {
            task.abort();
        }
    }
}

impl WsClient {
    /// Open a transport to `config.url` and perform the upgrade handshake.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, transport or TLS errors, and with
    /// [`WsError::HandshakeFailed`] when the server does not accept the
    /// upgrade. The transport is released on failure.
    pub async fn connect<H>(config: ClientConfig, handler: H) -> WsResult<Self>
    where
        H: WebSocketEvent,
    {
        config.validate()?;
        let target = config.target()?;
        let transport = transport::open(&target, &config).await?;
        Self::establish(ConnectionId::new(), config, target, Arc::new(handler), transport).await
    }

    /// Perform the upgrade handshake over an already-open stream.
    ///
    /// The URL still determines the request path and `Host` header.
    pub async fn connect_with_stream<H, S>(config: ClientConfig, handler: H, stream: S) -> WsResult<Self>
    where
        H: WebSocketEvent,
        S: Transport + 'static,
    {
        config.validate()?;
        let target = config.target()?;
        Self::establish(ConnectionId::new(), config, target, Arc::new(handler), Box::new(stream)).await
    }

    #[instrument(name = "ws_connection", skip_all, fields(connection_id = %id, url = %config.url))]
    async fn establish(
        id: ConnectionId,
        config: ClientConfig,
        target: Target,
        handler: Arc<dyn WebSocketEvent>,
        transport: BoxedTransport,
    ) -> WsResult<Self> {
        debug!(state = %ConnectionState::Connecting, "Upgrading transport");
        let io = Arc::new(ConnectionIo::new(transport));

        let leftover = match upgrade(&io, &config, &target).await {
            Ok(leftover) => leftover,
            Err(e) => {
                warn!(error = %e, state = %ConnectionState::Disconnected, "Handshake failed");
                io.close().await;
                return Err(e);
            }
        };

        let sender = FrameSender::new(Arc::clone(&io), config.max_frame_size);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let dispatcher =
            Dispatcher::new(handler, sender.clone(), config.auto_respond_to_ping).spawn(events_rx);

        let client = Self {
            inner: Arc::new(Inner {
                id,
                config,
                target,
                connected_at: Instant::now(),
                span: Span::current(),
                io,
                sender,
                state: Mutex::new(ConnectionState::Open),
                running: AtomicBool::new(true),
                started: AtomicBool::new(false),
                close_sent: AtomicBool::new(false),
                leftover: Mutex::new(leftover),
                events: Mutex::new(Some(events_tx)),
                dispatcher: Mutex::new(Some(dispatcher)),
                ping_task: Mutex::new(None),
            }),
        };

        client.start_ping_timer();
        info!(path = %client.inner.target.path, "Connection open");
        Ok(client)
    }

    /// Get the connection ID.
    pub fn connection_id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Get the connection configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get the connection target.
    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    /// Get how long this connection has been open.
    pub fn connection_duration(&self) -> std::time::Duration {
        self.inner.connected_at.elapsed()
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Whether the connection is running and its transport usable.
    pub fn is_alive(&self) -> bool {
        self.is_running() && self.inner.io.is_alive()
    }

    fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Drive the receive loop until the connection closes.
    ///
    /// Returns `Ok(())` after a Close frame, a peer disconnect or a local
    /// close. Queued events are delivered before this returns. The
    /// connection is released either way.
    ///
    /// # Errors
    ///
    /// [`WsError::AlreadyRunning`] if the loop was already started, or the
    /// error that ended the loop while the connection was still running.
    pub async fn run(&self) -> WsResult<()> {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Err(WsError::AlreadyRunning);
        }

        let span = self.inner.span.clone();
        async {
            let result = match self.receive_loop().await {
                Err(WsError::ConnectionClosed { code, reason }) => {
                    info!(code = ?code, reason = %reason, "Connection closed by peer");
                    Ok(())
                }
                Err(e) if !self.is_running() => {
                    debug!(error = %e, "Receive loop stopped during shutdown");
                    Ok(())
                }
                other => other,
            };

            if let Err(e) = &result {
                error!(error = %e, "Receive loop failed");
            }

            self.release(true).await;
            result
        }
        .instrument(span)
        .await
    }

    /// Spawn [`run`](Self::run) on the runtime.
    pub fn run_async(&self) -> JoinHandle<WsResult<()>> {
        let client = self.clone();
        tokio::spawn(async move { client.run().await })
    }

    async fn receive_loop(&self) -> WsResult<()> {
        let inner = &*self.inner;
        let max = inner.config.max_frame_size;

        let events = inner.events.lock().clone();
        let Some(events) = events else {
            return Ok(());
        };
        let leftover = std::mem::take(&mut *inner.leftover.lock());
        let mut buf = BytesMut::from(&leftover[..]);

        while self.is_running() {
            while !header_len(&buf).is_some_and(|len| buf.len() >= len) {
                let chunk = inner.io.read(max).await?;
                if chunk.is_empty() {
                    debug!("Transport closed");
                    return Ok(());
                }
                buf.extend_from_slice(&chunk);
            }

            let frame = Frame::decode(&buf)?;
            buf.advance(frame.consumed());
            trace!(
                opcode = %frame.opcode(),
                len = frame.payload_length(),
                fin = frame.is_final(),
                "Frame received"
            );

            if frame.is_close() {
                return Err(self.answer_close(&frame).await);
            }

            let kind = EventKind::for_opcode(frame.opcode());
            let expected = frame.payload_length();
            let mut received = frame.payload().len() as u64;
            if received > 0 || expected == 0 {
                dispatch(
                    &events,
                    kind,
                    frame.is_final() && received == expected,
                    frame.payload().clone(),
                );
            }

            while received < expected {
                let want = usize::try_from(expected - received).map_or(max, |left| left.min(max));
                let chunk = inner.io.read(want).await?;
                if chunk.is_empty() {
                    debug!(received, expected, "Transport closed mid-frame");
                    return Ok(());
                }

                let chunk = frame.unmask(chunk, received);
                received += chunk.len() as u64;
                dispatch(&events, kind, frame.is_final() && received == expected, chunk);
            }
        }

        Ok(())
    }

    /// Echo the peer's close code unless we already sent a Close frame.
    ///
    /// Returns the peer's close status as [`WsError::ConnectionClosed`].
    async fn answer_close(&self, frame: &Frame) -> WsError {
        let code = frame
            .payload()
            .get(..2)
            .map(|raw| u16::from_be_bytes([raw[0], raw[1]]));
        let reason = frame
            .payload()
            .get(2..)
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .unwrap_or_default();
        let closed = WsError::connection_closed(code, reason);
        debug!(code = ?closed.close_code(), "Close frame received");

        self.inner.running.store(false, Ordering::Release);
        self.set_state(ConnectionState::Closing);

        if self.inner.close_sent.swap(true, Ordering::AcqRel) {
            return closed;
        }

        let payload = code.map_or_else(Bytes::new, |code| Bytes::copy_from_slice(&code.to_be_bytes()));
        if let Err(e) = self.inner.sender.send(OpCode::Close, payload).await {
            debug!(error = %e, "Failed to answer close frame");
        }
        closed
    }

    /// Send `payload` as one message, split into frames of at most
    /// `max_frame_size` bytes.
    ///
    /// # Errors
    ///
    /// [`WsError::TransportUnavailable`] once the transport is closed.
    pub async fn send(&self, opcode: OpCode, payload: impl Into<Bytes>) -> WsResult<()> {
        self.inner.sender.send(opcode, payload.into()).await
    }

    /// Send everything `reader` yields as one message.
    pub async fn send_reader<R>(&self, opcode: OpCode, reader: R) -> WsResult<()>
    where
        R: AsyncRead + Unpin,
    {
        self.inner.sender.send_reader(opcode, reader).await
    }

    /// Send a text message.
    pub async fn send_text(&self, text: &str) -> WsResult<()> {
        self.send(OpCode::Text, Bytes::copy_from_slice(text.as_bytes())).await
    }

    /// Send a binary message.
    pub async fn send_binary(&self, data: impl Into<Bytes>) -> WsResult<()> {
        self.send(OpCode::Binary, data).await
    }

    /// Send a Ping frame.
    pub async fn ping(&self, payload: impl Into<Bytes>) -> WsResult<()> {
        self.send(OpCode::Ping, payload).await
    }

    /// Send a Pong frame.
    pub async fn pong(&self, payload: impl Into<Bytes>) -> WsResult<()> {
        self.send(OpCode::Pong, payload).await
    }

    /// Send an empty Close frame and stop the receive loop.
    ///
    /// Only the first disconnect sends a frame. The transport stays open
    /// until the loop ends or [`close`](Self::close) is called.
    #[instrument(skip(self), fields(connection_id = %self.inner.id))]
    pub async fn disconnect(&self) -> WsResult<()> {
        self.send_close(Bytes::new()).await
    }

    /// Like [`disconnect`](Self::disconnect), with a status code and reason
    /// in the Close frame.
    #[instrument(skip(self, code, reason), fields(connection_id = %self.inner.id, code = code.as_u16()))]
    pub async fn disconnect_with(&self, code: CloseCode, reason: &str) -> WsResult<()> {
        self.send_close(Bytes::from(code.payload(reason))).await
    }

    async fn send_close(&self, payload: Bytes) -> WsResult<()> {
        self.inner.running.store(false, Ordering::Release);
        self.set_state(ConnectionState::Closing);

        if self.inner.close_sent.swap(true, Ordering::AcqRel) {
            debug!("Close frame already sent");
            return Ok(());
        }

        self.inner.sender.send(OpCode::Close, payload).await
    }

    /// Disconnect if still alive, then stop the ping timer, cancel pending
    /// event deliveries and release the transport. Calling this more than
    /// once has no effect.
    #[instrument(skip(self), fields(connection_id = %self.inner.id))]
    pub async fn close(&self) {
        if self.is_alive() {
            if let Err(e) = self.send_close(Bytes::new()).await {
                debug!(error = %e, "Failed to send close frame");
            }
        }
        self.release(false).await;
    }

    async fn release(&self, drain_events: bool) {
        self.inner.running.store(false, Ordering::Release);
        self.set_state(ConnectionState::Closing);

        let ping_task = self.inner.ping_task.lock().take();
        if let Some(task) = ping_task {
            task.abort();
        }

        self.inner.io.close().await;
        drop(self.inner.events.lock().take());

        let dispatcher = self.inner.dispatcher.lock().take();
        if let Some(task) = dispatcher {
            if drain_events {
                if let Err(e) = task.await {
                    warn!(error = %e, "Event dispatcher ended abnormally");
                }
            } else {
                task.abort();
            }
        }

        if self.set_state(ConnectionState::Closed) {
            info!(
                duration_ms = self.connection_duration().as_millis() as u64,
                "Connection closed"
            );
        }
    }

    fn set_state(&self, next: ConnectionState) -> bool {
        let mut state = self.inner.state.lock();
        if *state == next || *state == ConnectionState::Closed {
            return false;
        }
        debug!(from = %*state, to = %next, "State changed");
        *state = next;
        true
    }

    fn start_ping_timer(&self) {
        let Some(period) = self.inner.config.ping_interval else {
            return;
        };

        let sender = self.inner.sender.clone();
        let task = tokio::spawn(
            async move {
                let start = tokio::time::Instant::now() + period;
                let mut ticker = tokio::time::interval_at(start, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    ticker.tick().await;
                    match sender.send(OpCode::Ping, Bytes::new()).await {
                        Ok(()) => trace!("Keep-alive ping sent"),
                        Err(e) => warn!(error = %e, "Keep-alive ping failed"),
                    }
                }
            }
            .in_current_span(),
        );

        *self.inner.ping_task.lock() = Some(task);
    }
}

impl std::fmt::Debug for WsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsClient")
            .field("connection_id", &self.inner.id)
            .field("url", &self.inner.config.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Send the upgrade request and validate the response.
///
/// Returns bytes received after the response head.
async fn upgrade(io: &ConnectionIo, config: &ClientConfig, target: &Target) -> WsResult<Bytes> {
    let key = hermes_codec::generate_key();
    io.commit(&handshake::build_request(config, target, &key)).await?;

    let (head, leftover) = handshake::read_response(io, config.max_frame_size).await?;
    handshake::validate_response(&head, &config.http_version, &key)?;
    Ok(leftover)
}

fn dispatch(
    events: &mpsc::UnboundedSender<InboundEvent>,
    kind: EventKind,
    is_final: bool,
    payload: Bytes,
) {
    let event = InboundEvent {
        kind,
        is_final,
        payload,
    };
    if events.send(event).is_err() {
        debug!("Event dispatcher stopped, dropping event");
    }
}
