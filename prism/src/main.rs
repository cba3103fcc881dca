use std::process::ExitCode;

use clap::Parser;
use prism::cli::{normalize_args, run, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    // A .env file in the working directory feeds the environment source.
    dotenvy::dotenv().ok();

    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    match run(cli).await {
        Ok(()) => {
            tracing::info!("prism completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(error = ?e, "prism exited with error");
            eprintln!("[ERROR] {e:#}");
            ExitCode::FAILURE
        }
    }
}
