//! Exec session orchestration.
//!
//! A [`Session`] owns one [`Connection`] for the lifetime of a remote command.
//! It runs the keepalive guard and the input pump in the background, reads
//! inbound frames, copies output to the caller's sinks in wire order, and
//! stops on an exit status or a fatal error.
//!
//! ```text
//!            ┌──────────────┐  StdinData/StdinClose  ┌──────────┐
//!  stdin ───►│  input pump  ├───────────┐            │          │
//!            └──────────────┘           ▼            │          │
//!            ┌──────────────┐   ┌──────────────┐     │   peer   │
//!            │  keepalive   ├──►│  Connection  │◄───►│          │
//!            └──────────────┘   └──────┬───────┘     │          │
//!                                      │ Stdout/Stderr/ExitStatus
//!  stdout/stderr ◄──── session loop ◄──┘             └──────────┘
//! ```

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::connection::Connection;
use crate::error::{ExecError, ExecResult};
use crate::frame::Frame;
use crate::keepalive::spawn_keepalive;
use crate::stream::pump;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet started.
    Idle,
    /// Background tasks running, reading frames.
    Running,
    /// Shutting down: cancelling tasks and closing the connection.
    Draining,
    /// Everything joined, connection released.
    Closed,
}

/// One remote command execution.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    conn: Arc<Connection>,
    state: SessionState,
}

impl Session {
    /// Create a session that takes ownership of `conn`.
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self {
            id: Uuid::new_v4(),
            conn: Arc::new(conn),
            state: SessionState::Idle,
        }
    }

    /// Session identifier, used in logs.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion.
    ///
    /// Returns the remote exit code. A non-zero code is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Cancelled`] if `cancel` fires, a sink error if
    /// writing output fails, [`ExecError::AlreadyRun`] on a second call, and a
    /// transport error otherwise. The connection is closed on every path.
    pub async fn run<I, O, E>(
        &mut self,
        cancel: &CancellationToken,
        stdin: I,
        stdout: &mut O,
        stderr: &mut E,
    ) -> ExecResult<i32>
    where
        I: AsyncRead + Unpin + Send + 'static,
        O: AsyncWrite + Unpin + Send,
        E: AsyncWrite + Unpin + Send,
    {
        if self.state != SessionState::Idle {
            return Err(ExecError::AlreadyRun);
        }
        let span = info_span!("exec_session", session_id = %self.id);
        self.run_inner(cancel, stdin, stdout, stderr)
            .instrument(span)
            .await
    }

    async fn run_inner<I, O, E>(
        &mut self,
        cancel: &CancellationToken,
        stdin: I,
        stdout: &mut O,
        stderr: &mut E,
    ) -> ExecResult<i32>
    where
        I: AsyncRead + Unpin + Send + 'static,
        O: AsyncWrite + Unpin + Send,
        E: AsyncWrite + Unpin + Send,
    {
        if let Err(err) = self.conn.config().validate() {
            self.transition(SessionState::Draining);
            self.close_connection().await;
            self.transition(SessionState::Closed);
            return Err(err);
        }

        self.transition(SessionState::Running);
        let tasks = cancel.child_token();

        let keepalive = spawn_keepalive(Arc::clone(&self.conn), tasks.clone());
        let input = spawn_input_pump(Arc::clone(&self.conn), stdin);
        let watcher = spawn_cancel_watcher(Arc::clone(&self.conn), cancel.clone(), tasks.clone());

        let outcome = self.read_loop(stdout, stderr).await;

        self.transition(SessionState::Draining);
        tasks.cancel();
        self.close_connection().await;

        let probe_error = match keepalive.await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(join_err) => {
                warn!(error = %join_err, "keepalive task failed");
                None
            }
        };
        if let Err(join_err) = watcher.await {
            warn!(error = %join_err, "cancel watcher failed");
        }
        join_input_pump(input).await;

        self.transition(SessionState::Closed);

        match (outcome, probe_error) {
            (Ok(code), _) => Ok(code),
            (Err(_), _) if cancel.is_cancelled() => Err(ExecError::Cancelled),
            (Err(ExecError::ConnectionClosed), Some(probe_err)) => Err(probe_err),
            (Err(err), _) => Err(err),
        }
    }

    async fn read_loop<O, E>(&self, stdout: &mut O, stderr: &mut E) -> ExecResult<i32>
    where
        O: AsyncWrite + Unpin + Send,
        E: AsyncWrite + Unpin + Send,
    {
        loop {
            let raw = self.conn.read_message().await?;

            let frame = match Frame::decode(&raw) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(error = %err, len = raw.len(), "dropping malformed frame");
                    continue;
                }
            };

            let kind = frame.kind();
            match frame {
                Frame::StdoutData(payload) => copy_to(stdout, &payload, "stdout").await?,
                Frame::StderrData(payload) => copy_to(stderr, &payload, "stderr").await?,
                Frame::ExitStatus(code) => {
                    debug!(code, "remote process exited");
                    return Ok(code);
                }
                Frame::StdinData(_) | Frame::StdinClose => {
                    warn!(?kind, "ignoring stdin frame sent by peer");
                }
            }
        }
    }

    async fn close_connection(&self) {
        if let Err(err) = self.conn.close().await {
            warn!(error = %err, "failed to close connection cleanly");
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state change");
        self.state = next;
    }
}

/// Run one remote command over `conn`.
///
/// Convenience wrapper around [`Session::new`] and [`Session::run`]. On
/// return the connection is closed and every background task has been
/// joined.
///
/// # Errors
///
/// See [`Session::run`].
pub async fn execute<I, O, E>(
    cancel: &CancellationToken,
    conn: Connection,
    stdin: I,
    stdout: &mut O,
    stderr: &mut E,
) -> ExecResult<i32>
where
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send,
    E: AsyncWrite + Unpin + Send,
{
    Session::new(conn).run(cancel, stdin, stdout, stderr).await
}

async fn copy_to<W>(sink: &mut W, payload: &[u8], stream: &'static str) -> ExecResult<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let write = async {
        sink.write_all(payload).await?;
        sink.flush().await
    };
    write.await.map_err(|e| ExecError::Sink {
        stream,
        message: e.to_string(),
    })
}

fn spawn_input_pump<I>(conn: Arc<Connection>, stdin: I) -> JoinHandle<ExecResult<u64>>
where
    I: AsyncRead + Unpin + Send + 'static,
{
    let chunk_size = conn.config().stdin_chunk_size;
    tokio::spawn(async move { pump(&conn, stdin, chunk_size).await }.in_current_span())
}

/// Close the connection when the caller cancels, unblocking the read loop.
fn spawn_cancel_watcher(
    conn: Arc<Connection>,
    caller: CancellationToken,
    tasks: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            tokio::select! {
                biased;
                () = caller.cancelled() => {
                    debug!("caller cancelled, closing connection");
                    if let Err(err) = conn.close().await {
                        debug!(error = %err, "close on cancel failed");
                    }
                }
                () = tasks.cancelled() => {}
            }
        }
        .in_current_span(),
    )
}

/// The pump may still be parked on a source that never ends; stop it rather
/// than wait.
async fn join_input_pump(input: JoinHandle<ExecResult<u64>>) {
    if !input.is_finished() {
        input.abort();
    }
    match input.await {
        Ok(Ok(bytes)) => debug!(bytes, "input pump finished"),
        Ok(Err(err)) => warn!(error = %err, "input pump failed"),
        Err(join_err) if join_err.is_cancelled() => {
            debug!("input pump stopped before end of input");
        }
        Err(join_err) => warn!(error = %join_err, "input pump task failed"),
    }
}
