//! Frame encoding/decoding.
//!
//! Every binary WebSocket message carries exactly one frame. The layout is a
//! one-byte kind tag followed by a kind-specific body:
//!
//! ```text
//! StdinData / StdoutData / StderrData:  kind(1) | len(4, u32 BE) | payload(len)
//! StdinClose:                           kind(1)
//! ExitStatus:                           kind(1) | code(4, i32 BE)
//! ```
//!
//! Liveness probes and acknowledgements are WebSocket ping/pong control
//! messages and never appear in this kind space.

use bytes::{Buf, BufMut, Bytes};

use crate::error::CodecError;

/// Size of the kind tag in bytes.
pub const KIND_SIZE: usize = 1;

/// Size of the length prefix on data frames.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the exit status body.
pub const EXIT_STATUS_SIZE: usize = 4;

/// Maximum payload carried by a single data frame (16 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Kind tag of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Bytes from the local stdin, client to server.
    StdinData = 0x01,
    /// Local stdin reached end of input.
    StdinClose = 0x02,
    /// Bytes from the remote process stdout.
    StdoutData = 0x03,
    /// Bytes from the remote process stderr.
    StderrData = 0x04,
    /// The remote process exited.
    ExitStatus = 0x05,
}

impl FrameKind {
    /// Wire value of this kind.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::StdinData),
            0x02 => Some(Self::StdinClose),
            0x03 => Some(Self::StdoutData),
            0x04 => Some(Self::StderrData),
            0x05 => Some(Self::ExitStatus),
            _ => None,
        }
    }
}

/// One unit of the exec protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Chunk of local stdin.
    StdinData(Bytes),
    /// End of local stdin. Sent exactly once per session.
    StdinClose,
    /// Chunk of remote stdout.
    StdoutData(Bytes),
    /// Chunk of remote stderr.
    StderrData(Bytes),
    /// Remote exit code.
    ExitStatus(i32),
}

impl Frame {
    /// Build a stdin data frame.
    pub fn stdin(payload: impl Into<Bytes>) -> Self {
        Self::StdinData(payload.into())
    }

    /// Build a stdout data frame.
    pub fn stdout(payload: impl Into<Bytes>) -> Self {
        Self::StdoutData(payload.into())
    }

    /// Build a stderr data frame.
    pub fn stderr(payload: impl Into<Bytes>) -> Self {
        Self::StderrData(payload.into())
    }

    /// Kind tag of this frame.
    #[must_use]
    pub const fn kind(&self) -> FrameKind {
        match self {
            Self::StdinData(_) => FrameKind::StdinData,
            Self::StdinClose => FrameKind::StdinClose,
            Self::StdoutData(_) => FrameKind::StdoutData,
            Self::StderrData(_) => FrameKind::StderrData,
            Self::ExitStatus(_) => FrameKind::ExitStatus,
        }
    }

    /// Number of bytes [`Frame::encode`] produces.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        KIND_SIZE
            + match self {
                Self::StdinData(p) | Self::StdoutData(p) | Self::StderrData(p) => {
                    LENGTH_PREFIX_SIZE + p.len()
                }
                Self::StdinClose => 0,
                Self::ExitStatus(_) => EXIT_STATUS_SIZE,
            }
    }

    /// Encode this frame into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PayloadTooLarge`] if a data payload exceeds
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut dst = Vec::with_capacity(self.encoded_len());
        dst.put_u8(self.kind().as_u8());

        match self {
            Self::StdinData(payload) | Self::StdoutData(payload) | Self::StderrData(payload) => {
                if payload.len() > MAX_PAYLOAD_SIZE {
                    return Err(CodecError::PayloadTooLarge {
                        size: payload.len(),
                        max: MAX_PAYLOAD_SIZE,
                    });
                }
                dst.put_u32(payload.len() as u32);
                dst.put_slice(payload);
            }
            Self::StdinClose => {}
            Self::ExitStatus(code) => dst.put_i32(*code),
        }

        Ok(dst)
    }

    /// Decode a frame from one complete message.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] on an unknown kind tag, a truncated body, an
    /// oversized length prefix, or trailing bytes.
    pub fn decode(src: &[u8]) -> Result<Self, CodecError> {
        let mut buf = src;
        if !buf.has_remaining() {
            return Err(CodecError::Empty);
        }

        let tag = buf.get_u8();
        let kind = FrameKind::from_u8(tag).ok_or(CodecError::UnknownKind(tag))?;

        let frame = match kind {
            FrameKind::StdinClose => Self::StdinClose,
            FrameKind::ExitStatus => {
                ensure_remaining(kind, EXIT_STATUS_SIZE, buf.remaining())?;
                Self::ExitStatus(buf.get_i32())
            }
            FrameKind::StdinData | FrameKind::StdoutData | FrameKind::StderrData => {
                let payload = read_payload(kind, &mut buf)?;
                match kind {
                    FrameKind::StdinData => Self::StdinData(payload),
                    FrameKind::StdoutData => Self::StdoutData(payload),
                    _ => Self::StderrData(payload),
                }
            }
        };

        if buf.has_remaining() {
            return Err(CodecError::TrailingBytes {
                kind,
                extra: buf.remaining(),
            });
        }

        Ok(frame)
    }
}

fn ensure_remaining(kind: FrameKind, needed: usize, available: usize) -> Result<(), CodecError> {
    if available < needed {
        return Err(CodecError::Truncated {
            kind,
            needed,
            available,
        });
    }
    Ok(())
}

fn read_payload(kind: FrameKind, buf: &mut &[u8]) -> Result<Bytes, CodecError> {
    ensure_remaining(kind, LENGTH_PREFIX_SIZE, buf.remaining())?;
    let len = buf.get_u32() as usize;
    if len > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge {
            size: len,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    ensure_remaining(kind, len, buf.remaining())?;
    Ok(buf.copy_to_bytes(len))
}
