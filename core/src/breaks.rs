//! Paginated row-level break decoding

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::adapter::{BreakPageQuery, DqStore};
use crate::domain::{PageRequest, Pagination, MAX_LOOKBACK_DAYS};
use crate::error::{CoreError, Result};
use crate::headers::resolve_headers;
use crate::sql_gen::{SqlGenerator, DATASET_LIST_QUERY};

/// Start of a lookback window of `days` days ending at `now`
pub fn date_threshold(now: NaiveDateTime, days: i64) -> Result<NaiveDateTime> {
    if days > MAX_LOOKBACK_DAYS {
        return Err(CoreError::Validation(format!(
            "days must be at most {}, got {}",
            MAX_LOOKBACK_DAYS, days
        )));
    }
    Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| CoreError::Validation(format!("days out of range: {}", days)))
}

/// A validated request for one page of decoded breaks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakPageRequest {
    pub dataset: String,
    pub page: PageRequest,
    /// Lookback window, at least one day
    pub days: i64,
}

impl BreakPageRequest {
    pub fn new(dataset: impl Into<String>, page: PageRequest, days: i64) -> Self {
        Self {
            dataset: dataset.into(),
            page,
            days: days.max(1),
        }
    }
}

/// Bound values of the break query, echoed for client bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakQueryParameters {
    pub dataset: String,
    pub date_threshold: NaiveDateTime,
    pub page_size: i64,
    pub offset: i64,
}

/// One page of decoded break records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakPage {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
    pub pagination: Pagination,
    pub list_query: String,
    pub parse_query: String,
    pub parameters: BreakQueryParameters,
}

/// Decode one page of a dataset's break records against its header
pub async fn fetch_break_page(
    store: &dyn DqStore,
    request: &BreakPageRequest,
    now: NaiveDateTime,
) -> Result<BreakPage> {
    let dataset = request.dataset.as_str();
    let since = date_threshold(now, request.days)?;

    if !store.dataset_exists(dataset).await? {
        return Err(CoreError::DatasetNotFound(dataset.to_string()));
    }

    let total_count = store.count_breaks(dataset, since).await?;
    debug!("Total break records for {}: {}", dataset, total_count);

    let header = resolve_headers(store, dataset).await?;
    let projection = SqlGenerator::build_projection(&header);
    let parse_query = SqlGenerator::generate_parse_query(&projection);

    let query = BreakPageQuery {
        sql: parse_query.clone(),
        dataset: dataset.to_string(),
        since,
        limit: request.page.page_size,
        offset: request.page.offset(),
    };
    let rows = store.fetch_break_rows(&query).await?;
    info!(
        "Decoded {} break rows for {} (page {}, size {})",
        rows.len(),
        dataset,
        request.page.page,
        request.page.page_size
    );

    Ok(BreakPage {
        columns: projection.columns,
        rows,
        pagination: Pagination::new(request.page, total_count),
        list_query: DATASET_LIST_QUERY.to_string(),
        parse_query,
        parameters: BreakQueryParameters {
            dataset: query.dataset,
            date_threshold: since,
            page_size: query.limit,
            offset: query.offset,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::test_support::MockStore;
    use chrono::NaiveDate;
    use mockall::predicate::eq;
    use serde_json::json;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_date_threshold() {
        let since = date_threshold(now(), 3).unwrap();
        assert_eq!(
            since,
            NaiveDate::from_ymd_opt(2024, 6, 7)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_date_threshold_out_of_range() {
        assert!(matches!(
            date_threshold(now(), i64::MAX),
            Err(CoreError::Validation(_))
        ));
        assert!(date_threshold(now(), MAX_LOOKBACK_DAYS).is_ok());
        assert!(matches!(
            date_threshold(now(), MAX_LOOKBACK_DAYS + 1),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_request_floors_days() {
        let request = BreakPageRequest::new("orders", PageRequest::default(), 0);
        assert_eq!(request.days, 1);
    }

    #[tokio::test]
    async fn test_fetch_break_page() {
        let mut store = MockStore::new();
        store
            .expect_dataset_exists()
            .with(eq("orders"))
            .returning(|_| Ok(true));
        store.expect_count_breaks().returning(|_, _| Ok(101));
        store
            .expect_fetch_header()
            .returning(|_| Ok(Some("id~|~|amount".to_string())));
        store
            .expect_fetch_break_rows()
            .withf(|query| {
                query.dataset == "orders"
                    && query.limit == 100
                    && query.offset == 100
                    && query.sql.contains(r#"d.value[3] AS "amount""#)
            })
            .returning(|_| {
                Ok(vec![json!({
                    "dataset": "orders",
                    "rule_nm": "positive_amount",
                    "id": "17",
                    "amount": "-4"
                })])
            });

        let request = BreakPageRequest::new("orders", PageRequest::new(2, 100), 1);
        let page = fetch_break_page(&store, &request, now()).await.unwrap();

        assert_eq!(page.columns, vec!["id", "amount"]);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.pagination.total_count, 101);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.parameters.offset, 100);
        assert_eq!(page.parameters.date_threshold, date_threshold(now(), 1).unwrap());
    }

    #[tokio::test]
    async fn test_fetch_break_page_clamps_page_size() {
        let mut store = MockStore::new();
        store.expect_dataset_exists().returning(|_| Ok(true));
        store.expect_count_breaks().returning(|_, _| Ok(0));
        store
            .expect_fetch_header()
            .returning(|_| Ok(Some("A".to_string())));
        store
            .expect_fetch_break_rows()
            .withf(|query| query.limit == 1000)
            .returning(|_| Ok(vec![]));

        let request = BreakPageRequest::new("orders", PageRequest::new(1, 5000), 1);
        let page = fetch_break_page(&store, &request, now()).await.unwrap();

        assert_eq!(page.pagination.page_size, 1000);
        assert_eq!(page.parameters.page_size, 1000);
        assert_eq!(page.pagination.total_pages, 0);
    }

    #[tokio::test]
    async fn test_fetch_break_page_unknown_dataset() {
        let mut store = MockStore::new();
        store.expect_dataset_exists().returning(|_| Ok(false));
        store.expect_count_breaks().never();
        store.expect_fetch_break_rows().never();

        let request = BreakPageRequest::new("ghost", PageRequest::default(), 1);
        let err = fetch_break_page(&store, &request, now()).await.unwrap_err();

        assert!(err.to_string().contains("ghost"));
        assert!(matches!(err, CoreError::DatasetNotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_break_page_without_headers() {
        let mut store = MockStore::new();
        store.expect_dataset_exists().returning(|_| Ok(true));
        store.expect_count_breaks().returning(|_, _| Ok(12));
        store
            .expect_fetch_header()
            .returning(|_| Ok(Some(String::new())));
        store.expect_fetch_break_rows().never();

        let request = BreakPageRequest::new("orders", PageRequest::default(), 1);
        let err = fetch_break_page(&store, &request, now()).await.unwrap_err();

        assert!(matches!(err, CoreError::NoHeaders(_)));
    }
}
