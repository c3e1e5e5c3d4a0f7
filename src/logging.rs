use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Target used for per-call worker events (very chatty at debug level)
pub const WORKER_TARGET: &str = "olap_stress::worker";

/// Install the global subscriber. Keep the returned guard alive until exit,
/// otherwise buffered file output is lost.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender = match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins; otherwise silence per-call worker events unless debugging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.log_level == "debug" || config.log_level == "trace" {
            EnvFilter::new(&config.log_level)
        } else {
            EnvFilter::new(format!("{},{}=warn", config.log_level, WORKER_TARGET))
        }
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_thread_names(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    guard
}
