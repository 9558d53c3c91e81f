//! Logging initialization.
//!
//! Logs go to a per-run file so they never interleave with prompts or
//! command output on the terminal.
//!
//! The level comes from `RUST_LOG` (`debug`, `info`, `warn`, `error`) and
//! defaults to `info`.

use std::fs;
use std::path::Path;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber writing to `<dir>/termpilot.<timestamp>.log`.
///
/// Returns the writer guard; logs are flushed when it drops, so keep it
/// alive for the whole run. On any setup failure a warning goes to stderr
/// and the run continues without logging.
pub fn init_logging(dir: &Path) -> Option<WorkerGuard> {
    if let Err(e) = fs::create_dir_all(dir) {
        eprintln!("Warning: Failed to create log directory {}: {}", dir.display(), e);
        return None;
    }

    let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let log_path = dir.join(format!("termpilot.{}.log", timestamp));
    let log_file = match fs::File::create(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: Failed to create log file: {}", e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Warning: Failed to install logger: {}", e);
        return None;
    }

    tracing::info!("Logging initialized - writing to {}", log_path.display());
    Some(guard)
}
