//! SprintSaaS cache tool - inspect and manage cached storefront queries
//!
//! Operates on the on-disk mirror of the storefront's read-through cache.

use clap::Parser;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sprintcache::cli::Cli;

/// Logs to stderr so command output on stdout stays machine-readable.
/// Filter comes from `RUST_LOG`, defaulting to warnings only.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let stdout = io::stdout();
    match cli.execute(&mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
