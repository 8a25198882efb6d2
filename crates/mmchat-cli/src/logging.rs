//! Tracing setup: a daily rolling log file under `$MMCHAT_HOME/logs`, or
//! stderr for commands that never touch the store or the gateway.
//!
//! Filter comes from `MMCHAT_LOG`, then `RUST_LOG`, defaulting to `warn`.
//! Falls back to stderr when the log directory cannot be created.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use mmchat_core::config::paths;

const LOG_ENV: &str = "MMCHAT_LOG";
const DEFAULT_FILTER: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Installs the global subscriber. The log directory is only created when
/// `to_file` is set. Keep the guard alive until exit so buffered lines are
/// flushed.
pub fn init(to_file: bool) -> Option<WorkerGuard> {
    if !to_file {
        init_stderr();
        return None;
    }

    let logs_dir = paths::logs_dir();
    if let Err(e) = std::fs::create_dir_all(&logs_dir) {
        init_stderr();
        tracing::debug!(error = %e, dir = %logs_dir.display(), "log directory unavailable");
        return None;
    }

    let appender = tracing_appender::rolling::daily(&logs_dir, "mmchat.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Some(guard)
}
