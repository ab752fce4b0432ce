//! CLI error types.

use thiserror::Error;
use vspace_exec::ExecError;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The exec session failed.
    #[error(transparent)]
    Exec(#[from] ExecError),
}
