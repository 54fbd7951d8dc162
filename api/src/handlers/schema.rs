//! Schema metadata handler

use axum::{extract::State, Json};

use crate::error::ApiResult;
use crate::state::AppState;
use dq_monitor_core::domain::SchemaReport;

/// Column metadata of the scan, schema and catalog tables
pub async fn get_schema(State(state): State<AppState>) -> ApiResult<Json<SchemaReport>> {
    let store = state.store().await?;
    let report = store.schema_report().await?;

    Ok(Json(report))
}
