//! CafePOS runtime configuration schema.
//!
//! Every section has defaults, so an empty file (or no file) is a valid
//! development setup: in-memory backend, open CORS, info logging.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CafePosConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub refresh: RefreshSettings,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Allow any origin (the cashier UI is served from a different host).
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            cors: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Hosted backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Rest,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Base URL of the hosted service (`rest` only), e.g. `https://xyz.example.co`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Service API key sent as `apikey` and as the default bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Table status refresh
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshSettings {
    pub enabled: bool,
    pub interval_ms: u64,
    pub activity_threshold_ms: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
            activity_threshold_ms: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthConfig {
    /// Cookie names checked for a bearer token, in priority order.
    pub cookie_names: Vec<String>,
    /// Static token table used by the built-in authenticator.
    pub tokens: Vec<TokenEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_names: vec![
                "sb-access-token".to_string(),
                "access_token".to_string(),
                "auth-token".to_string(),
            ],
            tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEntry {
    pub token: String,
    pub staff_id: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "cashier".to_string()
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for daily-rotated NDJSON logs; console only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// Emit JSON on the console instead of human-readable lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let cfg: CafePosConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, CafePosConfig::default());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.backend.kind, BackendKind::Memory);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let yaml = r#"
server:
  port: 9000
backend:
  kind: rest
  url: https://pos.example.co
auth:
  tokens:
    - token: abc
      staffId: s1
"#;
        let cfg: CafePosConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.backend.kind, BackendKind::Rest);
        assert_eq!(cfg.auth.tokens[0].role, "cashier");
        assert_eq!(cfg.auth.cookie_names.len(), 3);
        assert_eq!(cfg.refresh.interval_ms, 30_000);
    }
}
