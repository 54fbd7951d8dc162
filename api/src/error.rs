//! API error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dq_monitor_core::domain::HealthReport;
use dq_monitor_core::CoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Core(#[from] CoreError),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Health dashboard body when the window holds no data
#[derive(Serialize)]
pub struct NoDataResponse {
    pub error: String,
    #[serde(flatten)]
    pub report: HealthReport,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Core(CoreError::NoData { .. }) = &self {
            let body = NoDataResponse {
                error: self.to_string(),
                report: HealthReport::default(),
            };
            return (StatusCode::NOT_FOUND, Json(body)).into_response();
        }

        let (status, error_type) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Core(core) => match core {
                CoreError::DatasetNotFound(_) | CoreError::NoHeaders(_) | CoreError::NoData { .. } => {
                    (StatusCode::NOT_FOUND, "not_found")
                }
                CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "bad_request"),
                CoreError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
                CoreError::Serialization(_) | CoreError::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
                }
            },
        };

        let details = if status.is_server_error() {
            error!("Request failed: {:?}", self);
            Some(format!("{:?}", self))
        } else {
            None
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
