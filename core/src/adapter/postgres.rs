//! PostgreSQL store implementation

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{postgres::PgPool, Row};
use tracing::debug;

use crate::adapter::{BreakPageQuery, DqStore};
use crate::domain::{BreakingDataset, ColumnMeta};
use crate::error::{CoreError, Result};
use crate::health::{AggregateKind, COUNT_FACTS_SQL};
use crate::sql_gen::{
    SqlGenerator, COUNT_BREAKS_SQL, DATASET_EXISTS_SQL, FETCH_HEADER_SQL,
    LIST_BREAKING_DATASETS_SQL, MAX_COUNTED_BREAKS,
};

const TABLE_COLUMNS_SQL: &str = r#"
    SELECT
        column_name::text AS "column",
        data_type::text AS data_type,
        character_maximum_length::int4 AS max_length
    FROM information_schema.columns
    WHERE table_schema = 'public'
    AND table_name = $1
    ORDER BY ordinal_position
"#;

/// PostgreSQL-backed data-quality store
///
/// Every query checks a connection out of the pool and hands it back when
/// the query future completes or is dropped.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_json_rows(
        &self,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<serde_json::Value>> {
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                row.try_get::<serde_json::Value, _>("row_data")
                    .map_err(CoreError::from)
            })
            .collect()
    }
}

#[async_trait]
impl DqStore for PostgresStore {
    async fn ping(&self) -> Result<()> {
        let row = sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        let one: i32 = row.try_get(0)?;
        if one != 1 {
            return Err(CoreError::Internal(format!(
                "Unexpected connection check result: {}",
                one
            )));
        }
        Ok(())
    }

    async fn list_breaking_datasets(&self, since: NaiveDateTime) -> Result<Vec<BreakingDataset>> {
        let datasets = sqlx::query_as::<_, BreakingDataset>(LIST_BREAKING_DATASETS_SQL)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        debug!("Found {} breaking datasets since {}", datasets.len(), since);
        Ok(datasets)
    }

    async fn dataset_exists(&self, dataset: &str) -> Result<bool> {
        let row = sqlx::query(DATASET_EXISTS_SQL)
            .bind(dataset)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get::<bool, _>(0)?)
    }

    async fn fetch_header(&self, dataset: &str) -> Result<Option<String>> {
        let row = sqlx::query(FETCH_HEADER_SQL)
            .bind(dataset)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("linkid")))
    }

    async fn count_breaks(&self, dataset: &str, since: NaiveDateTime) -> Result<i64> {
        let row = sqlx::query(COUNT_BREAKS_SQL)
            .bind(dataset)
            .bind(since)
            .bind(MAX_COUNTED_BREAKS)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("cnt")?)
    }

    async fn fetch_break_rows(&self, query: &BreakPageQuery) -> Result<Vec<serde_json::Value>> {
        let sql = SqlGenerator::wrap_as_json_rows(&query.sql);
        self.fetch_json_rows(
            sqlx::query(&sql)
                .bind(query.dataset.as_str())
                .bind(query.since)
                .bind(query.limit)
                .bind(query.offset),
        )
        .await
    }

    async fn count_health_facts(&self, days: i32) -> Result<i64> {
        let row = sqlx::query(COUNT_FACTS_SQL)
            .bind(days)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("cnt")?)
    }

    async fn aggregate_rows(
        &self,
        kind: AggregateKind,
        days: i32,
    ) -> Result<Vec<serde_json::Value>> {
        let sql = SqlGenerator::wrap_as_json_rows(&kind.sql());
        self.fetch_json_rows(sqlx::query(&sql).bind(days)).await
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        let columns = sqlx::query_as::<_, ColumnMeta>(TABLE_COLUMNS_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        Ok(columns)
    }
}
