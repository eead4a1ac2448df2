//! Config file location and loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

use crate::env::resolve_env_vars_with;
use crate::schema::CafePosConfig;

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the CafePOS config directory.
/// Priority: `CAFEPOS_CONFIG_DIR` env > `~/.cafepos/` > `./.cafepos`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CAFEPOS_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".cafepos"),
        None => PathBuf::from(".cafepos"),
    }
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Load the config at `path`, substituting `${VAR}` references from the
/// process environment.
///
/// Returns `Ok(Default::default())` if the file doesn't exist (first run).
pub async fn load_config(path: &Path) -> Result<CafePosConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(CafePosConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let env = std::env::vars().collect();
    let config = parse_config(&raw, &env)
        .with_context(|| format!("Failed to load config at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Parse YAML text into a config, resolving `${VAR}` from `env`.
pub fn parse_config(
    raw: &str,
    env: &std::collections::HashMap<String, String>,
) -> Result<CafePosConfig> {
    // An empty file parses as YAML null.
    let value: Value = serde_yaml::from_str::<Option<Value>>(raw)
        .context("Failed to parse config YAML")?
        .unwrap_or_else(|| Value::Object(Default::default()));

    let value = resolve_env_vars_with(&value, env)?;

    serde_json::from_value(value).context("Config does not match the expected schema")
}
