use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::BridgeConfig;

/// Default filter when `RUST_LOG` is unset. Per-request HTTP spans stay at
/// `warn` unless the configured level is already `debug` or finer.
fn default_filter(level: &str) -> String {
    if level == "debug" || level == "trace" {
        level.to_string()
    } else {
        format!("{level},tower_http=warn")
    }
}

/// Initializes file + console logging.
/// Returns a guard that must be kept alive for the duration of the process.
pub fn init_logging(config: &BridgeConfig) -> Result<WorkerGuard> {
    let logs_dir = BridgeConfig::logs_dir()?;
    install(&logs_dir, &default_filter(&config.log_level), true)
}

fn install(logs_dir: &Path, filter: &str, console: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)?;

    // File appender: daily rotation
    let file_appender = tracing_appender::rolling::daily(logs_dir, "unqperp");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .with(console.then(|| {
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact()
        }))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(guard)
}
