//! Session and dial configuration.

use std::time::Duration;

use crate::error::{ExecError, ExecResult};

/// Default liveness window: a connection with no inbound traffic for this
/// long is considered dead.
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(60);

/// Default keepalive probe interval.
pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(30);

/// Default deadline for control frames (probes, acknowledgements, close).
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(10);

/// Default size of one stdin chunk: 32 KiB.
pub const DEFAULT_STDIN_CHUNK_SIZE: usize = 32 * 1024;

/// Default connection timeout when dialing.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing and buffering knobs for one exec session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Liveness window. Every inbound message pushes the read and write
    /// deadlines this far into the future.
    pub pong_wait: Duration,
    /// Interval between keepalive probes. Must be shorter than `pong_wait`.
    pub ping_period: Duration,
    /// Deadline applied to each control frame write.
    pub write_wait: Duration,
    /// Maximum number of stdin bytes per data frame.
    pub stdin_chunk_size: usize,
}

impl SessionConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pong_wait: DEFAULT_PONG_WAIT,
            ping_period: DEFAULT_PING_PERIOD,
            write_wait: DEFAULT_WRITE_WAIT,
            stdin_chunk_size: DEFAULT_STDIN_CHUNK_SIZE,
        }
    }

    /// Set the liveness window.
    #[must_use]
    pub const fn with_pong_wait(mut self, wait: Duration) -> Self {
        self.pong_wait = wait;
        self
    }

    /// Set the keepalive probe interval.
    #[must_use]
    pub const fn with_ping_period(mut self, period: Duration) -> Self {
        self.ping_period = period;
        self
    }

    /// Set the control frame write deadline.
    #[must_use]
    pub const fn with_write_wait(mut self, wait: Duration) -> Self {
        self.write_wait = wait;
        self
    }

    /// Set the stdin chunk size.
    #[must_use]
    pub const fn with_stdin_chunk_size(mut self, size: usize) -> Self {
        self.stdin_chunk_size = size;
        self
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Config`] if any duration is zero, the probe
    /// interval is not shorter than the liveness window, or the chunk size is
    /// zero.
    pub fn validate(&self) -> ExecResult<()> {
        if self.pong_wait.is_zero() || self.ping_period.is_zero() || self.write_wait.is_zero() {
            return Err(ExecError::Config("durations must be non-zero".into()));
        }
        if self.ping_period >= self.pong_wait {
            return Err(ExecError::Config(format!(
                "ping period ({:?}) must be shorter than pong wait ({:?})",
                self.ping_period, self.pong_wait
            )));
        }
        if self.stdin_chunk_size == 0 {
            return Err(ExecError::Config("stdin chunk size must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// How to reach the exec endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct DialConfig {
    /// Upper bound on TCP connect plus WebSocket upgrade.
    pub connect_timeout: Duration,
    /// Bearer token sent in the `Authorization` header, if any.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for DialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialConfig")
            .field("connect_timeout", &self.connect_timeout)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl DialConfig {
    /// Create a dial configuration with default values and no token.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            bearer_token: None,
        }
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

impl Default for DialConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.pong_wait, Duration::from_secs(60));
        assert_eq!(config.ping_period, Duration::from_secs(30));
        assert_eq!(config.write_wait, Duration::from_secs(10));
        assert_eq!(config.stdin_chunk_size, 32 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::new()
            .with_pong_wait(Duration::from_secs(20))
            .with_ping_period(Duration::from_secs(5))
            .with_write_wait(Duration::from_secs(2))
            .with_stdin_chunk_size(512);
        assert_eq!(config.pong_wait, Duration::from_secs(20));
        assert_eq!(config.ping_period, Duration::from_secs(5));
        assert_eq!(config.write_wait, Duration::from_secs(2));
        assert_eq!(config.stdin_chunk_size, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ping_period_must_be_shorter_than_pong_wait() {
        let config = SessionConfig::new()
            .with_pong_wait(Duration::from_secs(10))
            .with_ping_period(Duration::from_secs(10));
        let err = config.validate().expect_err("should be invalid");
        assert!(err.to_string().contains("ping period"));
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(SessionConfig::new().with_write_wait(Duration::ZERO).validate().is_err());
        assert!(SessionConfig::new().with_ping_period(Duration::ZERO).validate().is_err());
        assert!(SessionConfig::new().with_stdin_chunk_size(0).validate().is_err());
    }

    #[test]
    fn test_dial_config_debug_redacts_token() {
        let config = DialConfig::new().with_bearer_token("secret-token");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("redacted"));
    }
}
