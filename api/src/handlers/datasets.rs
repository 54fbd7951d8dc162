//! Dataset listing and break decoding handlers

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Local;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::handlers::{parse_days, parse_param};
use crate::state::AppState;
use dq_monitor_core::breaks::{date_threshold, fetch_break_page, BreakPage, BreakPageRequest};
use dq_monitor_core::domain::{BreakingDataset, PageRequest, DEFAULT_PAGE_SIZE};

/// Dataset listing query parameters
#[derive(Debug, Deserialize)]
pub struct DatasetsQuery {
    pub days: Option<String>,
}

/// List datasets whose latest run breaks and which had breaks recently
pub async fn list_datasets(
    State(state): State<AppState>,
    Query(query): Query<DatasetsQuery>,
) -> ApiResult<Json<Vec<BreakingDataset>>> {
    let days = parse_days(query.days.as_deref(), 1)?;
    let since = date_threshold(Local::now().naive_local(), days.into())?;
    debug!("Listing breaking datasets for last {} days (since {})", days, since);

    let store = state.store().await?;
    let datasets = store.list_breaking_datasets(since).await?;

    Ok(Json(datasets))
}

/// Break decoding query parameters
#[derive(Debug, Deserialize)]
pub struct ParseQuery {
    pub dataset: Option<String>,
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
    pub days: Option<String>,
}

impl ParseQuery {
    fn into_request(self) -> ApiResult<BreakPageRequest> {
        let dataset = self
            .dataset
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Dataset parameter is required".to_string()))?;

        let page = parse_param("page", self.page.as_deref(), 1_i64)?;
        let page_size = parse_param("pageSize", self.page_size.as_deref(), DEFAULT_PAGE_SIZE)?;
        let days = parse_param("days", self.days.as_deref(), 1_i64)?;

        Ok(BreakPageRequest::new(
            dataset,
            PageRequest::new(page, page_size),
            days,
        ))
    }
}

/// Decode one page of a dataset's break records into named columns
pub async fn parse_dataset(
    State(state): State<AppState>,
    Query(query): Query<ParseQuery>,
) -> ApiResult<Json<BreakPage>> {
    let request = query.into_request()?;
    debug!(
        "Parsing dataset {}: page={}, size={}, days={}",
        request.dataset, request.page.page, request.page.page_size, request.days
    );

    let store = state.store().await?;
    let page = fetch_break_page(store.as_ref(), &request, Local::now().naive_local()).await?;

    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(dataset: Option<&str>, page: Option<&str>, size: Option<&str>) -> ParseQuery {
        ParseQuery {
            dataset: dataset.map(str::to_string),
            page: page.map(str::to_string),
            page_size: size.map(str::to_string),
            days: None,
        }
    }

    #[test]
    fn test_into_request_defaults() {
        let request = query(Some("orders"), None, None).into_request().unwrap();
        assert_eq!(request.dataset, "orders");
        assert_eq!(request.page, PageRequest::new(1, 100));
        assert_eq!(request.days, 1);
    }

    #[test]
    fn test_into_request_clamps() {
        let request = query(Some("orders"), Some("0"), Some("5000"))
            .into_request()
            .unwrap();
        assert_eq!(request.page.page, 1);
        assert_eq!(request.page.page_size, 1000);
    }

    #[test]
    fn test_into_request_requires_dataset() {
        assert!(query(None, None, None).into_request().is_err());
        assert!(query(Some("  "), None, None).into_request().is_err());
    }

    #[test]
    fn test_into_request_rejects_bad_numbers() {
        let err = query(Some("orders"), Some("two"), None)
            .into_request()
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
