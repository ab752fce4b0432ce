//! # vspace-exec
//!
//! Remote command execution transport for the vspace control plane.
//!
//! A remote process's stdin, stdout, stderr and exit status are multiplexed
//! over a single WebSocket. The connection is kept alive with ping/pong
//! probes and always closed in order when the session ends.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐     exec frames      ┌──────────────────┐
//! │ vspace-cli │◄────────────────────►│  control plane   │
//! └────────────┘     (WebSocket)      └──────────────────┘
//! ```
//!
//! - [`frame`]: wire codec for [`Frame`]s
//! - [`connection`]: write-serialised [`Connection`] with liveness deadlines
//! - [`keepalive`]: periodic probes
//! - [`stream`]: stdin pump
//! - [`session`]: the orchestrator and the [`execute`] entry point
//!
//! # Example
//!
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//! use vspace_exec::{connect, execute, DialConfig, SessionConfig};
//!
//! # async fn example() -> Result<(), vspace_exec::ExecError> {
//! let conn = connect("ws://localhost:8080/exec", &DialConfig::new(), SessionConfig::new()).await?;
//! let cancel = CancellationToken::new();
//! let code = execute(
//!     &cancel,
//!     conn,
//!     tokio::io::stdin(),
//!     &mut tokio::io::stdout(),
//!     &mut tokio::io::stderr(),
//! )
//! .await?;
//! println!("remote exited with {code}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod dial;
pub mod error;
pub mod frame;
pub mod keepalive;
pub mod session;
pub mod stream;

#[cfg(test)]
mod testing;

pub use config::{DialConfig, SessionConfig};
pub use connection::{Connection, Control};
pub use dial::connect;
pub use error::{CodecError, ExecError, ExecResult};
pub use frame::{Frame, FrameKind};
pub use keepalive::{spawn_keepalive, KeepaliveGuard};
pub use session::{execute, Session, SessionState};
pub use stream::pump;
