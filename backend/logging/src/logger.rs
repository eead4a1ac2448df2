//! Structured Logger
//!
//! Wraps `tracing` with a console layer and an optional daily-rotated NDJSON
//! file layer, filtered by `RUST_LOG` or the configured level.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file prefix inside the log directory (`cafepos.log.YYYY-MM-DD`).
const LOG_FILE_PREFIX: &str = "cafepos.log";

#[derive(Debug, Clone, Default)]
pub struct LoggerOptions<'a> {
    pub level: &'a str,
    pub log_dir: Option<&'a Path>,
    /// JSON console output instead of human-readable lines.
    pub json: bool,
}

/// Initialize the global subscriber. Returns false if one was already set.
pub fn init_logger(options: LoggerOptions<'_>) -> bool {
    let level = if options.level.is_empty() { "info" } else { options.level };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = options.log_dir.and_then(|dir| {
        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .build(dir)
        {
            Ok(appender) => Some(fmt::layer().json().with_writer(appender).with_ansi(false)),
            Err(e) => {
                eprintln!("file logging disabled ({}): {e}", dir.display());
                None
            }
        }
    });

    let registry = tracing_subscriber::registry().with(env_filter).with(file_layer);

    let result = if options.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stdout))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stdout).with_target(false))
            .try_init()
    };
    result.is_ok()
}
