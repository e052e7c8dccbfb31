use std::path::Path;

pub const LOG_FILE_NAME: &str = "price_update.log";

/// Log to stderr and append to `price_update.log` in `log_dir`.
pub fn init_logging(log_dir: &Path) {
    use tracing_appender::rolling;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    // Create log directory if it doesn't exist
    let _ = std::fs::create_dir_all(log_dir);

    // Single file, appended across runs
    let file_appender = rolling::never(log_dir, LOG_FILE_NAME);

    let _ = tracing_subscriber::registry()
        .with(
            // Respect RUST_LOG if provided, else default to info
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init();
}
