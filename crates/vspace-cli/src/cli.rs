//! Command-line argument parsing with clap.

use clap::{Args, Parser, Subcommand};

/// vspace CLI - multi-tenant spaces on Kubernetes.
#[derive(Parser, Debug, Clone)]
#[command(name = "vspace")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Control plane URL to connect to.
    #[arg(short, long, env = "VSPACE_GATEWAY", default_value = "ws://localhost:8080")]
    pub gateway: String,

    /// Access token sent as a bearer token.
    #[arg(long, env = "VSPACE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a command inside a space workload.
    Exec(ExecArgs),
}

/// Arguments for the exec command.
#[derive(Args, Debug, Clone)]
pub struct ExecArgs {
    /// Workload to exec into, as `<space>/<workload>`.
    #[arg(required = true)]
    pub target: String,

    /// Command to run, after `--`.
    #[arg(last = true)]
    pub command: Vec<String>,

    /// Forward local stdin to the remote command.
    #[arg(short = 'i', long)]
    pub stdin: bool,

    /// Seconds between keepalive probes.
    #[arg(long, default_value_t = 30, value_name = "SECS")]
    pub ping_period: u64,

    /// Seconds without traffic before the connection is considered dead.
    #[arg(long, default_value_t = 60, value_name = "SECS")]
    pub pong_wait: u64,

    /// Seconds to wait for the connection to be established.
    #[arg(long, default_value_t = 10, value_name = "SECS")]
    pub connect_timeout: u64,
}
