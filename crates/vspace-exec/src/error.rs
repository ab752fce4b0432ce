//! Error types for the vspace-exec crate.

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::frame::FrameKind;

/// Errors produced while decoding or encoding a single frame.
///
/// A decode error never ends a session on its own; the session loop logs it
/// and keeps reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The message carried no bytes at all.
    #[error("empty frame")]
    Empty,

    /// The leading kind tag is not one we know.
    #[error("unknown frame kind: {0:#04x}")]
    UnknownKind(u8),

    /// The body is shorter than its kind (or length prefix) requires.
    #[error("truncated {kind:?} frame: needed {needed} bytes, got {available}")]
    Truncated {
        /// Kind of the frame being decoded.
        kind: FrameKind,
        /// Bytes required to finish the body.
        needed: usize,
        /// Bytes actually present.
        available: usize,
    },

    /// Bytes were left over after the body was complete.
    #[error("{extra} trailing bytes after {kind:?} frame")]
    TrailingBytes {
        /// Kind of the frame being decoded.
        kind: FrameKind,
        /// Number of unexpected bytes.
        extra: usize,
    },

    /// The payload exceeds the maximum frame payload size.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Size of the offending payload.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// Errors that end an exec session.
///
/// Holds only owned strings so a single close result can be replayed to every
/// caller of [`Connection::close`](crate::Connection::close).
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    /// The WebSocket transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection was closed, locally or by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// A read or write deadline elapsed.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The caller cancelled the session.
    #[error("session cancelled")]
    Cancelled,

    /// Writing remote output to a local sink failed.
    #[error("failed to write remote {stream}: {message}")]
    Sink {
        /// Which sink failed (`stdout` or `stderr`).
        stream: &'static str,
        /// Underlying I/O error.
        message: String,
    },

    /// Reading local input failed.
    #[error("failed to read stdin: {0}")]
    Stdin(String),

    /// A frame could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Invalid session or dial configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Dialing the exec endpoint failed.
    #[error("connection error: {0}")]
    Connect(String),

    /// A session can only run once.
    #[error("session has already run")]
    AlreadyRun,
}

impl From<WsError> for ExecError {
    fn from(err: WsError) -> Self {
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ConnectionClosed,
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Result type for exec operations.
pub type ExecResult<T> = Result<T, ExecError>;
