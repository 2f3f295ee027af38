use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} is not configured")]
    ConfigurationMissing(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            // Configuration, validation and upstream failures all surface as 400.
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (error_type, code) = match &self {
            AppError::ConfigurationMissing(_) => ("configuration_error", "configuration_missing"),
            AppError::Unauthorized => ("authentication_error", "unauthorized"),
            AppError::InvalidArgument(_) => ("invalid_request_error", "invalid_argument"),
            AppError::NotFound(_) => ("invalid_request_error", "not_found"),
            AppError::Store(e) => {
                tracing::error!("store error: {}", e);
                ("upstream_error", "upstream_failed")
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                ("internal_error", "internal_error")
            }
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type,
                "code": code,
            }
        }));

        (self.status(), body).into_response()
    }
}
