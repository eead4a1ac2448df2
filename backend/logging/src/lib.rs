//! Structured logging for CafePOS: subscriber setup and credential redaction.

pub mod logger;
pub mod redact;

pub use logger::{init_logger, LoggerOptions};
pub use redact::{redact_sensitive_data, token_hint};
