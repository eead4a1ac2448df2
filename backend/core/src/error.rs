use thiserror::Error;

use crate::resource::Resource;

/// Failure to obtain a usable status snapshot from the status source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("status source unreachable: {0}")]
    Unreachable(String),

    #[error("malformed status payload: {0}")]
    Malformed(String),

    #[error("no status row for entity '{0}'")]
    NotFound(String),
}

/// A caller-supplied refresh action failed. Caught at the scheduler boundary.
#[derive(Debug, Error)]
#[error("refresh action failed ({trigger}): {message}")]
pub struct RefreshCallbackError {
    pub trigger: &'static str,
    pub message: String,
}

impl RefreshCallbackError {
    pub fn new(trigger: &'static str, err: &anyhow::Error) -> Self {
        Self {
            trigger,
            message: format!("{err:#}"),
        }
    }
}

/// Errors surfaced by a hosted-backend implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{resource} '{id}' not found")]
    NotFound { resource: Resource, id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    pub fn not_found(resource: Resource, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }
}
