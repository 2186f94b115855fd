//! Error types for frame encoding and decoding.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding raw bytes into a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The bytes do not form a valid WebSocket frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

impl CodecError {
    /// Create a new malformed frame error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame(reason.into())
    }

    /// The buffer is shorter than the two mandatory header bytes.
    pub fn too_short(available: usize) -> Self {
        Self::malformed(format!(
            "expected at least 2 header bytes, got {available}"
        ))
    }

    /// The header declares more extended-length or mask bytes than were supplied.
    pub fn truncated(needed: usize, available: usize) -> Self {
        Self::malformed(format!(
            "header requires {needed} bytes, only {available} available"
        ))
    }

    /// The opcode nibble does not map to a known opcode.
    pub fn unknown_opcode(value: u8) -> Self {
        Self::malformed(format!("unknown opcode 0x{value:02X}"))
    }
}
