//! # vspace-cli
//!
//! vspace command-line interface.
//!
//! Provides commands for:
//! - Interactive remote exec into a space workload
//!
//! # Architecture
//!
//! The CLI dials the control plane's exec endpoint over WebSocket and hands
//! the connection to [`vspace_exec::execute`], which multiplexes the local
//! terminal's stdin, stdout and stderr over it.
//!
//! ```text
//! ┌────────────┐     exec frames      ┌──────────────────┐
//! │ vspace-cli │◄────────────────────►│  control plane   │
//! └────────────┘     (WebSocket)      └──────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::{Cli, Commands, ExecArgs};
pub use error::CliError;
