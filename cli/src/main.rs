//! agenthost: provision and bootstrap a single-host AI agent gateway

use clap::Parser;
use tracing_subscriber::EnvFilter;

use agenthost_cli::cli::Cli;
use agenthost_cli::output::json;

/// Filter directives for diagnostic logging, e.g. `AGENTHOST_LOG=debug`.
const LOG_ENV: &str = "AGENTHOST_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let json_errors = cli.wants_json();
    if let Err(e) = cli.run().await {
        let message = format!("{e:#}");
        match json_errors.then(|| json::format_error(&message, json::error_code(&e))) {
            Some(Ok(obj)) => println!("{obj}"),
            _ => eprintln!("Error: {message}"),
        }
        std::process::exit(1);
    }
}
