//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use cafepos_core::BackendError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Backend(BackendError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Backend(BackendError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Backend(BackendError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Backend(BackendError::Unavailable(_) | BackendError::Malformed(_)) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, "Backend failure: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cafepos_core::Resource;

    #[test]
    fn backend_errors_map_to_status_codes() {
        let cases = [
            (BackendError::not_found(Resource::Tables, "t9"), StatusCode::NOT_FOUND),
            (BackendError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (BackendError::Conflict("x".into()), StatusCode::CONFLICT),
            (BackendError::Unavailable("x".into()), StatusCode::BAD_GATEWAY),
            (BackendError::Malformed("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn response_carries_status() {
        let response = ApiError::Forbidden("admin only".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Unauthorized("no").into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
