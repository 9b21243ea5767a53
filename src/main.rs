mod aggregator;
mod cli;
mod data_loader;
mod error;
mod selector;
mod table;

use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt};

fn init_logging() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();

    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("An error occurred: {err:#}");
            eprintln!("Please ensure the dataset is correctly formatted and accessible.");
            ExitCode::FAILURE
        }
    }
}
