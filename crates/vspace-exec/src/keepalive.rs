//! Keepalive guard: periodic liveness probes for the session's lifetime.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn, Instrument};

use crate::connection::{Connection, Control};
use crate::error::ExecResult;

/// Sends a probe every `period` until cancelled.
#[derive(Debug)]
pub struct KeepaliveGuard {
    conn: Arc<Connection>,
    period: Duration,
    write_wait: Duration,
}

impl KeepaliveGuard {
    /// Create a guard using the connection's configured timings.
    #[must_use]
    pub fn new(conn: Arc<Connection>) -> Self {
        let config = *conn.config();
        Self {
            conn,
            period: config.ping_period,
            write_wait: config.write_wait,
        }
    }

    /// Run until `cancel` fires or a probe cannot be sent.
    ///
    /// A failed probe closes the connection, which unblocks the session's
    /// pending read.
    ///
    /// # Errors
    ///
    /// Returns the write error of the failed probe.
    pub async fn run(self, cancel: CancellationToken) -> ExecResult<()> {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("keepalive stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            let deadline = Instant::now() + self.write_wait;
            if let Err(err) = self.conn.write_control(Control::Ping(Vec::new()), deadline).await {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                warn!(error = %err, "keepalive probe failed, closing connection");
                if let Err(close_err) = self.conn.close().await {
                    debug!(error = %close_err, "close after failed probe also failed");
                }
                return Err(err);
            }
            trace!("sent keepalive probe");
        }
    }
}

/// Spawn a [`KeepaliveGuard`] for `conn` on the current runtime.
pub fn spawn_keepalive(
    conn: Arc<Connection>,
    cancel: CancellationToken,
) -> JoinHandle<ExecResult<()>> {
    let guard = KeepaliveGuard::new(conn);
    tokio::spawn(guard.run(cancel).in_current_span())
}
