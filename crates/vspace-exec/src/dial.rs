//! Dialing the exec endpoint.

use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::debug;

use crate::config::{DialConfig, SessionConfig};
use crate::connection::Connection;
use crate::error::{ExecError, ExecResult};

/// Open a WebSocket to `url` and wrap it as a [`Connection`].
///
/// # Errors
///
/// Returns an error if:
/// - The URL is invalid (must start with `ws://` or `wss://`)
/// - The bearer token is not a valid header value
/// - The connection or upgrade fails or times out
pub async fn connect(
    url: &str,
    dial: &DialConfig,
    session: SessionConfig,
) -> ExecResult<Connection> {
    if !url.starts_with("ws://") && !url.starts_with("wss://") {
        return Err(ExecError::Config(format!(
            "invalid exec URL: {url}, must start with ws:// or wss://"
        )));
    }

    let mut request = url
        .into_client_request()
        .map_err(|e| ExecError::Config(format!("invalid exec URL: {e}")))?;

    if let Some(token) = &dial.bearer_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ExecError::Config("bearer token is not a valid header value".into()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    debug!(url = %url, "connecting to exec endpoint");

    let (ws, response) = timeout(dial.connect_timeout, connect_async(request))
        .await
        .map_err(|_| ExecError::Timeout("connection timed out".into()))?
        .map_err(|e| ExecError::Connect(e.to_string()))?;

    debug!(status = %response.status(), "exec stream established");
    Ok(Connection::new(ws, session))
}
