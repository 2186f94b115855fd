//! Error types for the WebSocket client.
//!
//! This module defines the errors that can occur while opening a
//! transport, performing the upgrade handshake, and exchanging frames.

use std::fmt;

use hermes_codec::CodecError;
use thiserror::Error;

/// Result type for WebSocket operations.
pub type WsResult<T> = Result<T, WsError>;

/// Errors that can occur during WebSocket operations.
#[derive(Debug, Error)]
pub enum WsError {
    /// Inbound bytes could not be decoded into a frame.
    #[error(transparent)]
    MalformedFrame(#[from] CodecError),

    /// The server's upgrade response was missing required lines.
    #[error("WebSocket handshake failed: {0}")]
    HandshakeFailed(String),

    /// A write was attempted on a closed or disconnected transport.
    #[error("transport unavailable: not connected")]
    TransportUnavailable,

    /// The connection was closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Optional close code.
        code: Option<u16>,
        /// Reason for closing.
        reason: String,
    },

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The URL scheme is neither `ws` nor `wss`.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// TLS setup or negotiation failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// A receive loop is already running for this connection.
    #[error("receive loop already running")]
    AlreadyRunning,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WsError {
    /// Create a new handshake failed error.
    pub fn handshake_failed(reason: impl Into<String>) -> Self {
        Self::HandshakeFailed(reason.into())
    }

    /// Create a new connection closed error.
    pub fn connection_closed(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            code,
            reason: reason.into(),
        }
    }

    /// Create a new invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Create a new TLS error.
    pub fn tls(reason: impl Into<String>) -> Self {
        Self::Tls(reason.into())
    }

    /// Get the close code if this is a connection closed error.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::ConnectionClosed { code, .. } => *code,
            _ => None,
        }
    }

    /// Check if this error terminates the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame(_)
                | Self::HandshakeFailed(_)
                | Self::TransportUnavailable
                | Self::ConnectionClosed { .. }
                | Self::Tls(_)
                | Self::Io(_)
        )
    }
}

/// Close code for WebSocket connections (RFC 6455 §7.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    /// Normal closure (1000).
    Normal = 1000,
    /// Going away (1001).
    GoingAway = 1001,
    /// Protocol error (1002).
    Protocol = 1002,
    /// Unsupported data (1003).
    Unsupported = 1003,
    /// Invalid payload data (1007).
    InvalidPayload = 1007,
    /// Policy violation (1008).
    PolicyViolation = 1008,
    /// Message too big (1009).
    MessageTooBig = 1009,
    /// Extension required (1010).
    ExtensionRequired = 1010,
    /// Internal error (1011).
    InternalError = 1011,
}

impl CloseCode {
    /// Convert from a u16 code.
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::Normal),
            1001 => Some(Self::GoingAway),
            1002 => Some(Self::Protocol),
            1003 => Some(Self::Unsupported),
            1007 => Some(Self::InvalidPayload),
            1008 => Some(Self::PolicyViolation),
            1009 => Some(Self::MessageTooBig),
            1010 => Some(Self::ExtensionRequired),
            1011 => Some(Self::InternalError),
            _ => None,
        }
    }

    /// Get the u16 value of this close code.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Builds a Close frame payload: the code in network order followed by
    /// the UTF-8 reason.
    pub fn payload(self, reason: &str) -> Vec<u8> {
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&self.as_u16().to_be_bytes());
        payload.extend_from_slice(reason.as_bytes());
        payload
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "Normal",
            Self::GoingAway => "GoingAway",
            Self::Protocol => "Protocol",
            Self::Unsupported => "Unsupported",
            Self::InvalidPayload => "InvalidPayload",
            Self::PolicyViolation => "PolicyViolation",
            Self::MessageTooBig => "MessageTooBig",
            Self::ExtensionRequired => "ExtensionRequired",
            Self::InternalError => "InternalError",
        };
        write!(f, "{} ({})", name, self.as_u16())
    }
}
