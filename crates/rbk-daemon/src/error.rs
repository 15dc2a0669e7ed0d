//! HTTP mapping of engine and auth failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rbk_auth::AuthError;
use rbk_engine::EngineError;
use tracing::warn;

use crate::api_types::ErrorResponse;

/// Every handler failure funnels through here.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Auth(AuthError),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::Validation(_) => StatusCode::BAD_REQUEST,
                EngineError::Authorization(_) => StatusCode::FORBIDDEN,
                EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
                EngineError::Conflict { .. } | EngineError::Duplicate(_) => StatusCode::CONFLICT,
                EngineError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Auth(AuthError::Crypto(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Engine(e) => e.kind(),
            ApiError::Auth(AuthError::Crypto(_)) => "INTERNAL",
            ApiError::Auth(AuthError::InvalidCredentials) => "INVALID_CREDENTIALS",
            ApiError::Auth(_) => "UNAUTHENTICATED",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match &self {
            // Storage detail stays in the log; the client only learns it may retry.
            ApiError::Engine(EngineError::Storage(err)) => {
                warn!(error = %format!("{err:#}"), "request failed: storage");
                "storage unavailable; the request had no effect and may be retried".to_string()
            }
            ApiError::Auth(AuthError::Crypto(msg)) => {
                warn!(error = %msg, "request failed: crypto");
                "internal error".to_string()
            }
            ApiError::Engine(e) => e.to_string(),
            ApiError::Auth(e) => e.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                error: self.kind().to_string(),
                msg,
            }),
        )
            .into_response()
    }
}
