pub mod chart;
pub mod cli;
pub mod db;
pub mod engine;
pub mod errors;
pub mod growth;
pub mod models;
pub mod provider;
pub mod reconciler;
pub mod refresh;

use clap::Parser;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub fn run() {
    let cli = cli::Cli::parse();
    if let Err(error) = init_tracing(&cli.data_dir) {
        eprintln!("failed to initialize tracing: {}", error);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("failed to start async runtime: {}", error);
            std::process::exit(1);
        }
    };

    match runtime.block_on(cli::execute(cli)) {
        Ok(output) => println!("{}", output),
        Err(error) => {
            tracing::error!(error = %error, "command failed");
            eprintln!("{}", error);
            std::process::exit(1);
        }
    }
}

fn init_tracing(data_dir: &Path) -> Result<(), String> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "pulse.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
