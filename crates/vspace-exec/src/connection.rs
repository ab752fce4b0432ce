//! Concurrency-safe duplex connection over a WebSocket.
//!
//! One logical reader (the session loop) and any number of writers. All
//! writes go through a single mutex so frames never interleave on the wire.
//! Reads handle liveness traffic inline: a peer probe is answered with an
//! acknowledgement, and every inbound message pushes both deadlines forward
//! by the configured window.

use std::pin::Pin;

use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex as SyncMutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, OnceCell};
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::SessionConfig;
use crate::error::{ExecError, ExecResult};

type BoxedSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;
type BoxedStream = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;

/// Transport-level control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Liveness probe.
    Ping(Vec<u8>),
    /// Acknowledgement of a probe.
    Pong(Vec<u8>),
    /// Normal closure.
    Close,
}

impl From<Control> for Message {
    fn from(control: Control) -> Self {
        match control {
            Control::Ping(data) => Self::Ping(data.into()),
            Control::Pong(data) => Self::Pong(data.into()),
            Control::Close => Self::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            })),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Deadlines {
    read: Instant,
    write: Instant,
}

/// A duplex WebSocket connection shared by one session.
pub struct Connection {
    writer: Mutex<BoxedSink>,
    reader: Mutex<BoxedStream>,
    deadlines: SyncMutex<Deadlines>,
    config: SessionConfig,
    closed: CancellationToken,
    close_result: OnceCell<ExecResult<()>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("closed", &self.closed.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wrap an established WebSocket.
    pub fn new<S>(ws: WebSocketStream<S>, config: SessionConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        Self::from_parts(sink, stream, config)
    }

    /// Build a connection from any message sink and stream.
    pub fn from_parts<Si, St>(sink: Si, stream: St, config: SessionConfig) -> Self
    where
        Si: Sink<Message, Error = WsError> + Send + 'static,
        St: Stream<Item = Result<Message, WsError>> + Send + 'static,
    {
        let at = Instant::now() + config.pong_wait;
        Self {
            writer: Mutex::new(Box::pin(sink)),
            reader: Mutex::new(Box::pin(stream)),
            deadlines: SyncMutex::new(Deadlines { read: at, write: at }),
            config,
            closed: CancellationToken::new(),
            close_result: OnceCell::new(),
        }
    }

    /// Session configuration this connection was built with.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether [`Connection::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Read the next data message.
    ///
    /// Blocks until a binary or text message arrives, the read deadline
    /// elapses, or the connection closes. Probes are acknowledged and
    /// acknowledgements absorbed without returning. Only one task may read.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Timeout`] when no traffic arrives within the
    /// liveness window, [`ExecError::ConnectionClosed`] when the connection is
    /// closed locally or by the peer, and [`ExecError::Transport`] on any other
    /// transport failure.
    pub async fn read_message(&self) -> ExecResult<Vec<u8>> {
        let mut reader = self.reader.lock().await;

        loop {
            let deadline = self.deadlines.lock().read;

            let next = tokio::select! {
                biased;
                () = self.closed.cancelled() => return Err(ExecError::ConnectionClosed),
                () = sleep_until(deadline) => {
                    if self.deadlines.lock().read > deadline {
                        continue;
                    }
                    return Err(ExecError::Timeout(format!(
                        "no traffic from peer for {:?}",
                        self.config.pong_wait
                    )));
                }
                next = reader.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(err)) => return Err(err.into()),
                None => return Err(ExecError::ConnectionClosed),
            };

            self.extend_deadlines();

            match message {
                Message::Binary(data) => return Ok(data.into()),
                Message::Text(text) => return Ok(text.as_bytes().to_vec()),
                Message::Ping(data) => {
                    trace!(len = data.len(), "peer probe, acknowledging");
                    let deadline = Instant::now() + self.config.write_wait;
                    self.write_control(Control::Pong(data.into()), deadline).await?;
                }
                Message::Pong(_) => trace!("peer acknowledged probe"),
                Message::Close(frame) => {
                    debug!(?frame, "peer closed connection");
                    return Err(ExecError::ConnectionClosed);
                }
                Message::Frame(_) => {}
            }
        }
    }

    /// Write one data message.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::ConnectionClosed`] after close, or a transport or
    /// timeout error if the write fails.
    pub async fn write_message(&self, data: Vec<u8>) -> ExecResult<()> {
        if self.is_closed() {
            return Err(ExecError::ConnectionClosed);
        }
        let deadline = self.deadlines.lock().write;
        self.send(Message::Binary(data.into()), deadline).await
    }

    /// Write one control frame, giving up at `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::ConnectionClosed`] after close, or a transport or
    /// timeout error if the write fails.
    pub async fn write_control(&self, control: Control, deadline: Instant) -> ExecResult<()> {
        if self.is_closed() {
            return Err(ExecError::ConnectionClosed);
        }
        self.send(control.into(), deadline).await
    }

    /// Close the connection.
    ///
    /// The first call unblocks any pending read, sends a close frame and
    /// records the outcome. Later calls wait for and return that same outcome.
    ///
    /// # Errors
    ///
    /// Returns the error of the close frame write, if it failed.
    pub async fn close(&self) -> ExecResult<()> {
        self.close_result
            .get_or_init(|| async {
                self.closed.cancel();
                let deadline = Instant::now() + self.config.write_wait;
                let result = match self.send(Control::Close.into(), deadline).await {
                    Err(ExecError::ConnectionClosed) => Ok(()),
                    other => other,
                };
                debug!(ok = result.is_ok(), "connection closed");
                result
            })
            .await
            .clone()
    }

    async fn send(&self, message: Message, deadline: Instant) -> ExecResult<()> {
        let mut writer = self.writer.lock().await;
        match timeout_at(deadline, writer.send(message)).await {
            Ok(result) => result.map_err(ExecError::from),
            Err(_) => Err(ExecError::Timeout("write deadline exceeded".into())),
        }
    }

    fn extend_deadlines(&self) {
        let at = Instant::now() + self.config.pong_wait;
        let mut deadlines = self.deadlines.lock();
        deadlines.read = at;
        deadlines.write = at;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::testing::{fast_config, pipe};

    #[tokio::test]
    async fn test_read_returns_binary_payload() {
        let (conn, _written, inbound) = pipe(fast_config());
        inbound
            .unbounded_send(Ok(Message::Binary(vec![1, 2, 3].into())))
            .expect("send");

        assert_eq!(conn.read_message().await.expect("read"), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_read_acknowledges_probe() {
        let (conn, mut written, inbound) = pipe(fast_config());
        inbound
            .unbounded_send(Ok(Message::Ping(b"probe".to_vec().into())))
            .expect("send");
        inbound
            .unbounded_send(Ok(Message::Pong(Vec::new().into())))
            .expect("send");
        inbound
            .unbounded_send(Ok(Message::Binary(vec![9].into())))
            .expect("send");

        assert_eq!(conn.read_message().await.expect("read"), vec![9]);

        let reply = written.next().await.expect("pong written");
        assert_eq!(reply, Message::Pong(b"probe".to_vec().into()));
    }

    #[tokio::test]
    async fn test_read_peer_close() {
        let (conn, _written, inbound) = pipe(fast_config());
        inbound.unbounded_send(Ok(Message::Close(None))).expect("send");

        assert!(matches!(
            conn.read_message().await,
            Err(ExecError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_stream_end() {
        let (conn, _written, inbound) = pipe(fast_config());
        drop(inbound);

        assert!(matches!(
            conn.read_message().await,
            Err(ExecError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_deadline_elapses() {
        let config = fast_config().with_pong_wait(Duration::from_millis(50));
        let (conn, _written, _inbound) = pipe(config);

        let result = tokio::time::timeout(Duration::from_secs(2), conn.read_message())
            .await
            .expect("read should give up on its own");
        assert!(matches!(result, Err(ExecError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_inbound_traffic_extends_deadline() {
        let config = fast_config().with_pong_wait(Duration::from_millis(150));
        let (conn, _written, inbound) = pipe(config);

        let feeder = tokio::spawn(async move {
            for _ in 0..4 {
                tokio::time::sleep(Duration::from_millis(80)).await;
                if inbound
                    .unbounded_send(Ok(Message::Pong(Vec::new().into())))
                    .is_err()
                {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(80)).await;
            let _ = inbound.unbounded_send(Ok(Message::Binary(vec![7].into())));
        });

        // Total wait is ~400ms, well past a single 150ms window.
        assert_eq!(conn.read_message().await.expect("read"), vec![7]);
        feeder.await.expect("feeder");
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_read() {
        let (conn, _written, _inbound) = pipe(fast_config());
        let conn = Arc::new(conn);

        let reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.read_message().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        conn.close().await.expect("close");

        let result = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("reader should unblock")
            .expect("join");
        assert!(matches!(result, Err(ExecError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (conn, mut written, _inbound) = pipe(fast_config());

        conn.close().await.expect("first close");
        conn.close().await.expect("second close");
        assert!(conn.is_closed());

        drop(conn);
        let frames: Vec<Message> = written.by_ref().collect().await;
        let closes = frames.iter().filter(|m| m.is_close()).count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn test_writes_fail_after_close() {
        let (conn, _written, _inbound) = pipe(fast_config());
        conn.close().await.expect("close");

        assert!(matches!(
            conn.write_message(vec![1]).await,
            Err(ExecError::ConnectionClosed)
        ));
        let deadline = Instant::now() + Duration::from_secs(1);
        assert!(matches!(
            conn.write_control(Control::Ping(Vec::new()), deadline).await,
            Err(ExecError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_replays_first_failure() {
        let (conn, written, _inbound) = pipe(fast_config());
        // Receiver gone: the close frame write fails.
        drop(written);

        let first = conn.close().await.expect_err("close should fail");
        let second = conn.close().await.expect_err("close should fail again");
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_control_into_message() {
        assert!(Message::from(Control::Ping(Vec::new())).is_ping());
        assert!(Message::from(Control::Pong(Vec::new())).is_pong());
        assert!(Message::from(Control::Close).is_close());
    }
}
