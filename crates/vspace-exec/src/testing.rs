//! In-memory transport helpers for unit tests.

use std::io;
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::SinkExt;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::config::SessionConfig;
use crate::connection::Connection;
use crate::frame::Frame;

/// Config with short timers so tests finish quickly.
pub(crate) fn fast_config() -> SessionConfig {
    SessionConfig::new()
        .with_pong_wait(Duration::from_secs(5))
        .with_ping_period(Duration::from_secs(2))
        .with_write_wait(Duration::from_secs(1))
}

/// A connection backed by channels.
///
/// Returns the connection, the receiver of everything it writes, and the
/// sender feeding its reads.
pub(crate) fn pipe(
    config: SessionConfig,
) -> (
    Connection,
    UnboundedReceiver<Message>,
    UnboundedSender<Result<Message, WsError>>,
) {
    let (out_tx, out_rx) = mpsc::unbounded::<Message>();
    let (in_tx, in_rx) = mpsc::unbounded::<Result<Message, WsError>>();
    let sink = out_tx.sink_map_err(|e| WsError::Io(io::Error::new(io::ErrorKind::BrokenPipe, e)));
    (Connection::from_parts(sink, in_rx, config), out_rx, in_tx)
}

/// Encode a frame as a binary message.
pub(crate) fn binary(frame: &Frame) -> Message {
    Message::Binary(frame.encode().expect("encode").into())
}

/// Decode the data frames out of written messages, skipping control frames.
pub(crate) fn data_frames(messages: &[Message]) -> Vec<Frame> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Binary(data) => Some(Frame::decode(data).expect("decode")),
            _ => None,
        })
        .collect()
}
