//! Domain models for the DQ monitor service

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest page a client may request from the break query
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Page size used when the client does not ask for one
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Longest lookback window, in days, any endpoint accepts
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// One named column of a dataset's link-id header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderColumn {
    /// 1-based position of the value inside a break payload array
    pub position: usize,
    /// Trimmed column name
    pub name: String,
}

/// Ordered header of a dataset, recovered from its stored link id
///
/// Blank tokens are dropped but the positions of the remaining columns
/// still refer to the original, unfiltered token order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDescriptor {
    pub columns: Vec<HeaderColumn>,
}

impl HeaderDescriptor {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// A dataset whose latest run has breaking rules
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BreakingDataset {
    pub dataset: String,
    pub run_id: NaiveDateTime,
    pub linkid: String,
}

/// Normalized paging window for the break query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: i64,
    /// Rows per page, within `1..=MAX_PAGE_SIZE`
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// Pagination metadata echoed to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total_count: i64) -> Self {
        let total_count = total_count.max(0);
        Self {
            page: request.page,
            page_size: request.page_size,
            total_count,
            total_pages: (total_count + request.page_size - 1) / request.page_size,
        }
    }
}

/// Pass/fail/exception classification of a rule evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Passing,
    Breaking,
    Exception,
}

impl HealthStatus {
    /// Every status, in the order the global health rows are reported
    pub const ALL: [HealthStatus; 3] = [
        HealthStatus::Breaking,
        HealthStatus::Exception,
        HealthStatus::Passing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Passing => "PASSING",
            HealthStatus::Breaking => "BREAKING",
            HealthStatus::Exception => "EXCEPTION",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count and share of one status over the whole window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalHealthRow {
    pub pass_fail_exception: HealthStatus,
    pub cnt: i64,
    pub ratio: f64,
}

/// Count of one status on one run date
///
/// Facts that match none of the classification branches carry no status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRow {
    pub pass_fail_exception: Option<HealthStatus>,
    pub cnt: i64,
    pub run_id: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRow {
    pub dimension: String,
    pub pass_fail_exception: Option<HealthStatus>,
    pub cnt: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessUnitRow {
    pub biz_unit: String,
    pub pass_fail_exception: Option<HealthStatus>,
    pub cnt: i64,
}

/// Combined health dashboard payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub global_health: Vec<GlobalHealthRow>,
    pub time_series: Vec<TimeSeriesRow>,
    pub dimensions: Vec<DimensionRow>,
    pub business_units: Vec<BusinessUnitRow>,
    /// Seconds spent on each aggregate query, keyed by aggregate name
    pub query_timings: BTreeMap<String, f64>,
}

/// Column metadata from `information_schema.columns`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ColumnMeta {
    pub column: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub max_length: Option<i32>,
}

/// Column metadata keyed by table name
pub type SchemaReport = BTreeMap<String, Vec<ColumnMeta>>;
