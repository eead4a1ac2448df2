//! `cafepos-config`: CafePOS runtime configuration.
//!
//! Provides:
//! - Typed config schema (server, hosted backend, refresh, auth, logging)
//! - YAML loading with `${ENV_VAR}` substitution
//! - `CAFEPOS_*` environment overrides
//! - Validation with path-qualified errors and warnings

pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use env::{apply_env_overrides, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, parse_config};
pub use schema::{
    AuthConfig, BackendConfig, BackendKind, CafePosConfig, LoggingConfig, RefreshSettings,
    ServerConfig, TokenEntry,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::Result;
use std::path::Path;

/// Load a config file, apply environment overrides, and validate.
/// The caller decides whether errors are fatal.
pub async fn load_and_prepare(path: &Path) -> Result<(CafePosConfig, ValidationReport)> {
    let mut config = load_config(path).await?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    let report = validate(&config);
    Ok((config, report))
}

/// Emit validation findings through `tracing`.
pub fn log_report(report: &ValidationReport) {
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
}
