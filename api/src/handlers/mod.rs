//! API handlers

pub mod dashboard;
pub mod datasets;
pub mod schema;

use axum::Json;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{ApiError, ApiResult};
use dq_monitor_core::domain::MAX_LOOKBACK_DAYS;

/// Liveness response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
}

/// Plain-text liveness probe
pub async fn root() -> &'static str {
    "DQ monitor API is running"
}

/// JSON liveness probe
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "DQ monitor API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Parse an optional query parameter, falling back to `default` when absent
pub(crate) fn parse_param<T>(name: &str, value: Option<&str>, default: T) -> ApiResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| ApiError::BadRequest(format!("Invalid {} parameter '{}': {}", name, raw, e))),
    }
}

/// Parse a lookback window in days within `0..=MAX_LOOKBACK_DAYS`
pub(crate) fn parse_days(value: Option<&str>, default: i32) -> ApiResult<i32> {
    let days = parse_param("days", value, default)?;
    if days < 0 {
        return Err(ApiError::BadRequest(format!(
            "Invalid days parameter '{}': must not be negative",
            days
        )));
    }
    if i64::from(days) > MAX_LOOKBACK_DAYS {
        return Err(ApiError::BadRequest(format!(
            "Invalid days parameter '{}': must be at most {}",
            days, MAX_LOOKBACK_DAYS
        )));
    }
    Ok(days)
}
