//! Protocol error types

use crate::messages::{MessageKind, Origin};
use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Serialization error from postcard
    #[error("Serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    /// Incompatible protocol version detected
    #[error(
        "Incompatible protocol version: {major}.{minor} (expected {expected_major}.{expected_minor})"
    )]
    IncompatibleVersion {
        major: u8,
        minor: u8,
        expected_major: u8,
        expected_minor: u8,
    },

    /// Envelope discriminator disagrees with the payload it carries
    #[error("Envelope kind {kind} does not match {content} content")]
    KindMismatch {
        kind: MessageKind,
        content: &'static str,
    },

    /// Envelope arrived from the wrong side of the link
    #[error("Expected {expected}-originated envelope, got {actual}-originated")]
    UnexpectedOrigin { expected: Origin, actual: Origin },

    /// Buffer too small for operation
    #[error("Buffer too small: needed {needed}, got {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Frame length exceeds maximum allowed size
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Incomplete frame data
    #[error("Incomplete frame: expected {expected} bytes, got {actual}")]
    IncompleteFrame { expected: usize, actual: usize },

    /// I/O error during frame operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether this error is a contract breach between collaborators rather
    /// than a transport or encoding failure
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            Self::KindMismatch { .. } | Self::UnexpectedOrigin { .. }
        )
    }
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
