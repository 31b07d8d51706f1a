//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use dreamjob_core::{AuthError, EngineError};
use dreamjob_session::RegistryError;
use serde_json::json;

/// Error returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid or missing token")]
    Unauthenticated,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<AuthError> for ApiError {
    fn from(_: AuthError) -> Self {
        Self::Unauthenticated
    }
}

impl ApiError {
    /// Status code this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Registry(RegistryError::Factory(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Registry(RegistryError::NoActiveSession(_)) => StatusCode::NOT_FOUND,
            Self::Engine(EngineError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            Self::Engine(EngineError::Upstream(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
