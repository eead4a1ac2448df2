//! Runtime wiring derived from the loaded config.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use cafepos_config::{config_dir, config_file_path, BackendConfig, BackendKind, RefreshSettings};
use cafepos_core::Backend;
use cafepos_gateway::{MemoryBackend, RestBackend};
use cafepos_scheduler::RefreshConfig;

/// `--config` if given, otherwise the default location.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| config_file_path(&config_dir()))
}

pub fn refresh_config(settings: &RefreshSettings, interval_override: Option<u64>) -> RefreshConfig {
    RefreshConfig {
        interval: Duration::from_millis(interval_override.unwrap_or(settings.interval_ms).max(1)),
        enabled: settings.enabled,
        activity_threshold: Duration::from_millis(settings.activity_threshold_ms),
    }
}

pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
    match config.kind {
        BackendKind::Memory => {
            info!("Using in-memory backend");
            Ok(Arc::new(MemoryBackend::new()))
        }
        BackendKind::Rest => {
            let url = config
                .url
                .clone()
                .context("backend.url is required for the rest backend")?;
            info!(url = %url, "Using hosted REST backend");
            Ok(Arc::new(RestBackend::new(url, config.api_key.clone())))
        }
    }
}
