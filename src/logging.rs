//! Sets up where log messages go.

use std::{fs::OpenOptions, path::Path, sync::Arc};

use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::Error;

/// Map the number of `-v` flags to a log level. Warnings are always shown.
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global tracing subscriber.
///
/// Messages at `level` and above go to stderr; `RUST_LOG` takes precedence when set. If
/// `log_file` is given, debug messages are also appended to that file.
///
/// # Errors
/// Returns [Error::Io] if the log file cannot be opened.
///
/// # Panics
/// Panics if a global subscriber has already been installed.
pub fn init_tracing(level: LevelFilter, log_file: Option<&Path>) -> Result<(), Error> {
    let stderr_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    let debug_log = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_log)
        .with(debug_log)
        .init();

    Ok(())
}
