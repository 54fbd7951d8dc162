//! Health dashboard handler

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiResult;
use crate::handlers::parse_days;
use crate::state::AppState;
use dq_monitor_core::aggregate::HealthAggregator;
use dq_monitor_core::domain::HealthReport;

/// Default health window: the last 48 hours
const DEFAULT_HEALTH_DAYS: i32 = 2;

/// Health dashboard query parameters
#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    pub days: Option<String>,
}

/// Pass/fail/exception health of all monitored datasets
pub async fn get_dashboard_health(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> ApiResult<Json<HealthReport>> {
    let days = parse_days(query.days.as_deref(), DEFAULT_HEALTH_DAYS)?;
    debug!("Building health dashboard for last {} days", days);

    let store = state.store().await?;
    let report = HealthAggregator::new(store, state.config.health_query_workers)
        .run(days)
        .await?;

    Ok(Json(report))
}
