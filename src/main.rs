#![forbid(unsafe_code)]

mod card_events;
mod config;
mod constants;
mod daemon;
mod drm;
mod event_loop;
mod notify;
mod process_wait;
mod procfs;
mod randr;
mod reconcile;
mod types;
mod virt;

use std::process::ExitCode;
use tracing::{error, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

fn main() -> ExitCode {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {e}");
        return ExitCode::FAILURE;
    }

    match daemon::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "Resize watcher stopped");
            ExitCode::FAILURE
        }
    }
}
