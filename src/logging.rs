//! Diagnostic logging.
//!
//! Two sinks: stderr, filtered by `TASKSMITH_LOG` (default `warn`, `debug`
//! with `--verbose`), and `.tasksmith/logs/tasksmith.log`, which always
//! records `info` and above so a finished run can be diagnosed afterwards.
//! User-facing progress goes through [`crate::ui`], not through here.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV: &str = "TASKSMITH_LOG";
pub const LOG_FILE: &str = "tasksmith.log";

/// Keeps the file writer alive; drop it last so buffered lines are flushed.
#[must_use]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

fn stderr_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "tasksmith=debug,warn" } else { "warn" })
    })
}

/// Install the global subscriber. `log_dir` enables the file sink.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init(log_dir: Option<&Path>, verbose: bool) -> LogGuard {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter(verbose));

    let (file_layer, guard) = match log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(level);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    LogGuard { _file: guard }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_log_dir_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join(".tasksmith").join("logs");
        let _first = init(Some(&logs), false);
        assert!(logs.exists());
        let _second = init(None, true);
    }
}
