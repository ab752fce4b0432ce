//! vspace CLI binary entrypoint.
//!
//! This is the main entry point for the `vspace` command-line tool.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vspace_cli::cli::{Cli, Commands};
use vspace_cli::commands::{exit_status_byte, ExecCommand};

/// How long to wait for blocking tasks (the stdin reader) at shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries remote output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    // A stdin read may still be parked on a blocking thread.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(code) => ExitCode::from(exit_status_byte(code)),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<i32, vspace_cli::CliError> {
    match cli.command {
        Commands::Exec(args) => {
            let cmd = ExecCommand::new(&cli.gateway, cli.token.clone());
            cmd.execute(&args).await
        }
    }
}
