//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`exec`] - Remote command execution

pub mod exec;

pub use exec::{exit_status_byte, ExecCommand};
