//! Logging setup for the proxy core
//!
//! Statement-level diagnostics go to stdout for interactive runs and to a
//! `proxy.log` file for later inspection. Both outputs honor `RUST_LOG`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber: stdout plus a `proxy.log` file
///
/// File output is non-blocking so a slow disk never stalls the statement
/// path. The appender guard is leaked on purpose to keep the writer alive
/// for the life of the process.
pub fn init_logging() {
    let file_appender = tracing_appender::rolling::never(".", "proxy.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(env_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(env_filter()),
        )
        .init();

    std::mem::forget(guard);
}
