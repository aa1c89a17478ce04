// Timecapsule — Application Entry Point
//
// Parses CLI arguments, initializes structured logging on stderr, and
// dispatches to the command handler. Uses the tokio runtime for the UDS
// server.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use timecapsule::cli::{execute, Cli};

#[tokio::main]
async fn main() {
    // RUST_LOG=timecapsule=debug for verbose output. Credentials and
    // message bodies are never logged at any level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("timecapsule=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
