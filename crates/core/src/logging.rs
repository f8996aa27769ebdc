use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber: a daily-rolling file under `<index base>/../logs`
/// plus, optionally, stderr. A second call keeps the first subscriber.
pub fn init_logging(component: &str, to_stderr: bool) -> WorkerGuard {
    let base = crate::config::StubIndexConfig::base_index_dir();
    let log_dir = base
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("logs");
    let _ = std::fs::create_dir_all(&log_dir);

    // Files like indexer.log.2024-01-21
    let file_appender = tracing_appender::rolling::daily(&log_dir, component);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    let installed = if to_stderr {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);
        registry.with(stderr_layer).try_init()
    } else {
        registry.try_init()
    };
    if installed.is_err() {
        tracing::debug!("Global subscriber already installed; keeping it");
    }

    guard
}
