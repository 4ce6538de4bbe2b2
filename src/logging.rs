use crate::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber: readable lines on stdout, JSON lines in a
/// daily file under `config.directory`. `RUST_LOG` takes precedence over
/// `config.default_filter`.
///
/// The file writer stops when the returned guard is dropped, so hold it for
/// as long as the process should log.
pub fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    if let Err(e) = std::fs::create_dir_all(&config.directory) {
        eprintln!("Cannot create log directory '{}': {}", config.directory, e);
    }

    let appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().json().with_current_span(false).with_writer(file_writer))
        .try_init();

    if let Err(e) = installed {
        eprintln!("Logging already initialized: {}", e);
    }
    guard
}
