//! Exec command implementation.
//!
//! Runs a command inside a space workload with the local terminal attached.

use std::time::Duration;

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;
use vspace_exec::{connect, execute, DialConfig, SessionConfig};

use crate::cli::ExecArgs;
use crate::error::CliError;

/// Exec command executor.
pub struct ExecCommand {
    gateway_url: String,
    token: Option<String>,
}

impl ExecCommand {
    /// Create a new exec command.
    #[must_use]
    pub fn new(gateway_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            token,
        }
    }

    /// Execute the exec command.
    ///
    /// Returns the remote process exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid, the connection cannot
    /// be established, or the session fails.
    pub async fn execute(&self, args: &ExecArgs) -> Result<i32, CliError> {
        let url = build_exec_url(&self.gateway_url, &args.target, &args.command, args.stdin)?;
        let session = session_config(args)?;
        let dial = self.dial_config(args);

        let conn = connect(url.as_str(), &dial, session).await?;
        info!(target = %args.target, "attached to remote command");

        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    debug!("interrupt received, cancelling session");
                    cancel.cancel();
                }
            })
        };

        let stdin: Box<dyn AsyncRead + Unpin + Send> = if args.stdin {
            Box::new(tokio::io::stdin())
        } else {
            Box::new(tokio::io::empty())
        };
        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();

        let result = execute(&cancel, conn, stdin, &mut stdout, &mut stderr).await;
        interrupt.abort();

        let code = result?;
        debug!(code, "remote command finished");
        Ok(code)
    }

    fn dial_config(&self, args: &ExecArgs) -> DialConfig {
        let dial = DialConfig::new().with_connect_timeout(Duration::from_secs(args.connect_timeout));
        match &self.token {
            Some(token) => dial.with_bearer_token(token.clone()),
            None => dial,
        }
    }
}

/// Build the session configuration from exec arguments.
///
/// # Errors
///
/// Returns an error if the timings are inconsistent.
pub fn session_config(args: &ExecArgs) -> Result<SessionConfig, CliError> {
    let config = SessionConfig::new()
        .with_ping_period(Duration::from_secs(args.ping_period))
        .with_pong_wait(Duration::from_secs(args.pong_wait));
    config.validate()?;
    Ok(config)
}

/// Build the exec endpoint URL for `target`.
///
/// `ws://host/api` + `dev/web-0` + `[ls, -l]` gives
/// `ws://host/api/exec/dev/web-0?command=ls&command=-l`.
///
/// # Errors
///
/// Returns an error if the gateway URL is not a WebSocket URL, the target is
/// not `<space>/<workload>`, or the command is empty.
pub fn build_exec_url(
    gateway: &str,
    target: &str,
    command: &[String],
    stdin: bool,
) -> Result<Url, CliError> {
    let mut url = Url::parse(gateway)
        .map_err(|e| CliError::Config(format!("invalid gateway URL: {gateway}: {e}")))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(CliError::Config(format!(
            "invalid gateway URL: {gateway}, must start with ws:// or wss://"
        )));
    }

    let segments: Vec<&str> = target.split('/').collect();
    if segments.len() != 2 || segments.iter().any(|s| s.is_empty()) {
        return Err(CliError::InvalidArgument(format!(
            "invalid target: {target}, expected <space>/<workload>"
        )));
    }
    if command.is_empty() {
        return Err(CliError::InvalidArgument(
            "no command given, pass it after `--`".into(),
        ));
    }

    url.path_segments_mut()
        .map_err(|()| CliError::Config(format!("invalid gateway URL: {gateway}")))?
        .pop_if_empty()
        .push("exec")
        .extend(segments);

    {
        let mut query = url.query_pairs_mut();
        for arg in command {
            query.append_pair("command", arg);
        }
        if stdin {
            query.append_pair("stdin", "true");
        }
    }

    Ok(url)
}

/// Map a remote exit code to a process exit status.
///
/// Codes outside `0..=255` saturate; negative codes become 1.
#[must_use]
pub fn exit_status_byte(code: i32) -> u8 {
    if code < 0 {
        1
    } else {
        u8::try_from(code).unwrap_or(u8::MAX)
    }
}
