//! Tracing subscriber setup.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use emascan_core::config::LoggingConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.filter`. Human-readable output goes to
/// stderr; when `logging.log_dir` is set, JSON lines also go to a daily
/// rolling `emascan.log` there. Hold the returned guard until exit so the
/// file writer flushes.
pub fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))
        .with_context(|| format!("invalid log filter '{}'", logging.filter))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    let (file_layer, guard) = match &logging.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "emascan.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).json();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("install tracing subscriber")?;

    Ok(guard)
}
