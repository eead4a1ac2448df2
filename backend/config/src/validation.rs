//! Config validation with path-qualified messages.

use std::collections::HashSet;

use thiserror::Error;

use crate::schema::{BackendKind, CafePosConfig};

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &CafePosConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_backend(config, &mut report);
    validate_refresh(config, &mut report);
    validate_auth(config, &mut report);
    report
}

fn validate_server(config: &CafePosConfig, report: &mut ValidationReport) {
    let port = config.server.port;
    if port == 0 {
        report.error("server.port", "Port must be > 0");
    } else if port < 1024 && port != 80 && port != 443 {
        report.warn(
            "server.port",
            format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
        );
    }
    if config.server.bind.trim().is_empty() {
        report.error("server.bind", "Bind address cannot be empty");
    }
}

fn validate_backend(config: &CafePosConfig, report: &mut ValidationReport) {
    let backend = &config.backend;
    match backend.kind {
        BackendKind::Rest => {
            match backend.url.as_deref().map(str::trim) {
                None | Some("") => report.error("backend.url", "A rest backend requires a url"),
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    report.error("backend.url", format!("'{url}' is not an http(s) URL"))
                }
                Some(_) => {}
            }
            if backend.api_key.as_deref().map(str::is_empty).unwrap_or(true) {
                report.warn("backend.apiKey", "No API key; requests rely on caller credentials only");
            }
        }
        BackendKind::Memory => {
            if backend.url.is_some() {
                report.warn("backend.url", "url is ignored by the memory backend");
            }
        }
    }
}

fn validate_refresh(config: &CafePosConfig, report: &mut ValidationReport) {
    let refresh = &config.refresh;
    if refresh.interval_ms == 0 {
        report.error("refresh.intervalMs", "intervalMs must be > 0");
    } else if refresh.interval_ms < 1_000 {
        report.warn("refresh.intervalMs", "Intervals under 1s put heavy load on the backend");
    }
    if refresh.enabled && refresh.activity_threshold_ms >= refresh.interval_ms.saturating_mul(10) {
        report.warn(
            "refresh.activityThresholdMs",
            "Threshold is far above the interval; busy screens will rarely refresh",
        );
    }
}

fn validate_auth(config: &CafePosConfig, report: &mut ValidationReport) {
    let auth = &config.auth;
    for (i, name) in auth.cookie_names.iter().enumerate() {
        if name.trim().is_empty() || name.contains(['=', ';', ' ']) {
            report.error(format!("auth.cookieNames[{i}]"), format!("'{name}' is not a valid cookie name"));
        }
    }

    let mut seen = HashSet::new();
    for (i, entry) in auth.tokens.iter().enumerate() {
        let path = format!("auth.tokens[{i}]");
        if entry.token.trim().is_empty() {
            report.error(format!("{path}.token"), "Token cannot be empty");
        } else if !seen.insert(entry.token.as_str()) {
            report.error(format!("{path}.token"), "Duplicate token");
        }
        if entry.staff_id.trim().is_empty() {
            report.error(format!("{path}.staffId"), "staffId cannot be empty");
        }
        if !matches!(entry.role.as_str(), "admin" | "cashier" | "barista") {
            report.warn(format!("{path}.role"), format!("Unknown role '{}'", entry.role));
        }
    }
    if auth.tokens.is_empty() && config.backend.kind == BackendKind::Memory {
        report.warn("auth.tokens", "No tokens configured; every authenticated route will reject");
    }
}
