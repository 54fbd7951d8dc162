//! Data-quality store abstraction
//!
//! Everything the API reads from the warehouse goes through [`DqStore`], so
//! the break decoding and the aggregation engine can run against any
//! backing implementation.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;

use crate::domain::{BreakingDataset, ColumnMeta, SchemaReport};
use crate::error::Result;
use crate::health::AggregateKind;

pub mod postgres;

pub use postgres::PostgresStore;

/// Tables whose column metadata is exposed by the schema endpoint
pub const SCHEMA_TABLES: [&str; 3] = ["dataset_scan", "dataset_schema", "owl_catalog"];

/// Parameters of one windowed break query
#[derive(Debug, Clone, PartialEq)]
pub struct BreakPageQuery {
    /// Generated SQL, binding dataset, threshold, limit and offset as `$1..$4`
    pub sql: String,
    pub dataset: String,
    pub since: NaiveDateTime,
    pub limit: i64,
    pub offset: i64,
}

/// Read-only access to the data-quality warehouse
#[async_trait]
pub trait DqStore: Send + Sync {
    /// Trivial round-trip proving the store is reachable
    async fn ping(&self) -> Result<()>;

    /// Datasets whose latest run breaks, limited to those with breaks since `since`
    async fn list_breaking_datasets(&self, since: NaiveDateTime) -> Result<Vec<BreakingDataset>>;

    /// Whether the dataset has a header row
    async fn dataset_exists(&self, dataset: &str) -> Result<bool>;

    /// Raw link-id header of a dataset, `None` when the dataset has no header row
    async fn fetch_header(&self, dataset: &str) -> Result<Option<String>>;

    /// Number of break records of a dataset since `since`
    async fn count_breaks(&self, dataset: &str, since: NaiveDateTime) -> Result<i64>;

    /// One JSON object per decoded break record
    async fn fetch_break_rows(&self, query: &BreakPageQuery) -> Result<Vec<serde_json::Value>>;

    /// Number of rule evaluations in the health window
    async fn count_health_facts(&self, days: i32) -> Result<i64>;

    /// One JSON object per row of a health aggregate
    async fn aggregate_rows(&self, kind: AggregateKind, days: i32)
        -> Result<Vec<serde_json::Value>>;

    /// Column metadata of a public table
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnMeta>>;

    /// Column metadata of every table in [`SCHEMA_TABLES`]
    async fn schema_report(&self) -> Result<SchemaReport> {
        let mut report = SchemaReport::new();
        for table in SCHEMA_TABLES {
            report.insert(table.to_string(), self.table_columns(table).await?);
        }
        Ok(report)
    }
}

/// Store handle shared across requests and aggregate tasks
pub type SharedStore = Arc<dyn DqStore>;
