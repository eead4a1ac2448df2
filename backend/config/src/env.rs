//! Environment variable substitution and overrides.
//!
//! `${VAR_NAME}` in any string value is replaced at load time; only
//! uppercase `[A-Z_][A-Z0-9_]*` names match. `$${VAR}` is an escape for a
//! literal `${VAR}`.

use std::collections::HashMap;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::schema::{BackendKind, CafePosConfig};

/// Matches both `${VAR}` and the escaped `$${VAR}` form.
static VAR_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern"));

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references from the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value, MissingEnvVarError> {
    let env: HashMap<String, String> = std::env::vars().collect();
    resolve_env_vars_with(value, &env)
}

/// Substitute `${VAR}` references from `env`. Empty values count as missing.
pub fn resolve_env_vars_with(
    value: &Value,
    env: &HashMap<String, String>,
) -> Result<Value, MissingEnvVarError> {
    walk(value, env, "")
}

fn walk(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value, MissingEnvVarError> {
    Ok(match value {
        Value::String(s) => Value::String(substitute(s, env, path)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| walk(v, env, &format!("{path}[{i}]")))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, v) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                out.insert(key.clone(), walk(v, env, &child)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

fn substitute(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String, MissingEnvVarError> {
    if !s.contains("${") {
        return Ok(s.to_string());
    }
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in VAR_REF.captures_iter(s) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
        out.push_str(&s[last..whole.start]);
        let name = &caps[2];
        if !caps[1].is_empty() {
            out.push_str(&format!("${{{name}}}"));
        } else {
            match env.get(name).filter(|v| !v.is_empty()) {
                Some(v) => out.push_str(v),
                None => {
                    return Err(MissingEnvVarError {
                        var_name: name.to_string(),
                        config_path: path.to_string(),
                    })
                }
            }
        }
        last = whole.end;
    }
    out.push_str(&s[last..]);
    Ok(out)
}

/// Apply `CAFEPOS_*` environment overrides on top of a loaded config.
///
/// Setting `CAFEPOS_BACKEND_URL` also switches the backend to `rest`.
pub fn apply_env_overrides(config: &mut CafePosConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(bind) = lookup("CAFEPOS_BIND") {
        config.server.bind = bind;
    }
    if let Some(port) = lookup("CAFEPOS_PORT").and_then(|p| p.parse().ok()) {
        config.server.port = port;
    }
    if let Some(url) = lookup("CAFEPOS_BACKEND_URL") {
        config.backend.kind = BackendKind::Rest;
        config.backend.url = Some(url);
    }
    if let Some(key) = lookup("CAFEPOS_BACKEND_KEY") {
        config.backend.api_key = Some(key);
    }
    if let Some(level) = lookup("CAFEPOS_LOG") {
        config.logging.level = level;
    }
}
