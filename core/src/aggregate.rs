//! Parallel health aggregation engine
//!
//! The four dashboard aggregates are independent reads over the same base
//! relation. They are spawned onto a [`JoinSet`], bounded by a semaphore
//! sized to the worker count, and the engine waits until every aggregate
//! has arrived, failed or not. The first failure fails the whole report.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::adapter::SharedStore;
use crate::domain::HealthReport;
use crate::error::{CoreError, Result};
use crate::health::AggregateKind;

/// Default number of aggregate queries allowed in flight at once
pub const DEFAULT_WORKERS: usize = 4;

/// Runs the health aggregates concurrently and assembles the report
pub struct HealthAggregator {
    store: SharedStore,
    workers: Arc<Semaphore>,
}

impl HealthAggregator {
    pub fn new(store: SharedStore, workers: usize) -> Self {
        Self {
            store,
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Build the health report for the last `days` days
    ///
    /// Returns [`CoreError::NoData`] when the window holds no rule
    /// evaluations at all.
    pub async fn run(&self, days: i32) -> Result<HealthReport> {
        let facts = self.store.count_health_facts(days).await?;
        info!("Found {} rule evaluations in the last {} days", facts, days);
        if facts == 0 {
            return Err(CoreError::NoData { days });
        }

        let mut tasks = JoinSet::new();
        for kind in AggregateKind::ALL {
            let store = Arc::clone(&self.store);
            let workers = Arc::clone(&self.workers);
            tasks.spawn(async move {
                let (rows, elapsed) = match workers.acquire_owned().await {
                    Ok(_permit) => {
                        let started = Instant::now();
                        let rows = store.aggregate_rows(kind, days).await;
                        (rows, started.elapsed())
                    }
                    Err(e) => (
                        Err(CoreError::Internal(format!("Worker pool closed: {}", e))),
                        Duration::ZERO,
                    ),
                };
                (kind, rows, elapsed)
            });
        }

        let mut report = HealthReport::default();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| CoreError::Internal(format!("Aggregate task failed: {}", e)))
                .and_then(|(kind, rows, elapsed)| {
                    let rows = rows.map_err(|e| {
                        error!("Error executing {} query: {}", kind, e);
                        e
                    })?;
                    info!(
                        "{} query completed in {:.2} seconds ({} rows)",
                        kind,
                        elapsed.as_secs_f64(),
                        rows.len()
                    );
                    insert_aggregate(&mut report, kind, rows, elapsed)
                });

            // Siblings keep running until they finish; only the first error is reported
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        if let (Some(first), Some(last)) = (report.time_series.first(), report.time_series.last()) {
            debug!("Time series date range: {} to {}", first.run_id, last.run_id);
        }

        Ok(report)
    }
}

fn insert_aggregate(
    report: &mut HealthReport,
    kind: AggregateKind,
    rows: Vec<serde_json::Value>,
    elapsed: Duration,
) -> Result<()> {
    match kind {
        AggregateKind::GlobalHealth => report.global_health = decode_rows(rows)?,
        AggregateKind::TimeSeries => report.time_series = decode_rows(rows)?,
        AggregateKind::Dimensions => report.dimensions = decode_rows(rows)?,
        AggregateKind::BusinessUnits => report.business_units = decode_rows(rows)?,
    }
    report
        .query_timings
        .insert(kind.key().to_string(), elapsed.as_secs_f64());
    Ok(())
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<serde_json::Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(CoreError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::test_support::MockStore;
    use crate::adapter::{BreakPageQuery, DqStore};
    use crate::domain::{BreakingDataset, ColumnMeta, HealthStatus};
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn aggregate_fixture(kind: AggregateKind) -> Vec<Value> {
        match kind {
            AggregateKind::GlobalHealth => vec![
                json!({"pass_fail_exception": "BREAKING", "cnt": 3, "ratio": 0.3}),
                json!({"pass_fail_exception": "EXCEPTION", "cnt": 0, "ratio": 0}),
                json!({"pass_fail_exception": "PASSING", "cnt": 7, "ratio": 0.7}),
            ],
            AggregateKind::TimeSeries => vec![
                json!({"pass_fail_exception": "BREAKING", "cnt": 1, "run_id": "2024-06-08"}),
                json!({"pass_fail_exception": "PASSING", "cnt": 4, "run_id": "2024-06-09"}),
            ],
            AggregateKind::Dimensions => vec![
                json!({"dimension": "COMPLETENESS", "pass_fail_exception": "PASSING", "cnt": 7}),
                json!({"dimension": "UNSPECIFIED", "pass_fail_exception": "BREAKING", "cnt": 3}),
            ],
            AggregateKind::BusinessUnits => vec![
                json!({"biz_unit": "UNSPECIFIED", "pass_fail_exception": null, "cnt": 1}),
            ],
        }
    }

    fn store_with_facts(facts: i64) -> MockStore {
        let mut store = MockStore::new();
        store
            .expect_count_health_facts()
            .returning(move |_| Ok(facts));
        store
    }

    #[tokio::test]
    async fn test_run_assembles_all_aggregates() {
        let mut store = store_with_facts(10);
        store
            .expect_aggregate_rows()
            .times(4)
            .returning(|kind, _| Ok(aggregate_fixture(kind)));

        let aggregator = HealthAggregator::new(Arc::new(store), DEFAULT_WORKERS);
        let report = aggregator.run(2).await.unwrap();

        assert_eq!(report.global_health.len(), 3);
        assert_eq!(report.time_series.len(), 2);
        assert_eq!(report.dimensions.len(), 2);
        assert_eq!(report.business_units[0].pass_fail_exception, None);

        let keys: Vec<&String> = report.query_timings.keys().collect();
        assert_eq!(
            keys,
            vec!["businessUnits", "dimensions", "globalHealth", "timeSeries"]
        );
    }

    #[tokio::test]
    async fn test_global_health_reports_every_status() {
        let mut store = store_with_facts(10);
        store
            .expect_aggregate_rows()
            .returning(|kind, _| Ok(aggregate_fixture(kind)));

        let report = HealthAggregator::new(Arc::new(store), DEFAULT_WORKERS)
            .run(2)
            .await
            .unwrap();

        let statuses: Vec<HealthStatus> = report
            .global_health
            .iter()
            .map(|row| row.pass_fail_exception)
            .collect();
        assert_eq!(statuses, HealthStatus::ALL.to_vec());

        let exception = &report.global_health[1];
        assert_eq!(exception.cnt, 0);
        assert_eq!(exception.ratio, 0.0);

        let total: f64 = report.global_health.iter().map(|row| row.ratio).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_run_passes_window_to_every_query() {
        let mut store = MockStore::new();
        store
            .expect_count_health_facts()
            .with(mockall::predicate::eq(9))
            .returning(|_| Ok(1));
        store
            .expect_aggregate_rows()
            .withf(|_, days| *days == 9)
            .times(4)
            .returning(|_, _| Ok(vec![]));

        let report = HealthAggregator::new(Arc::new(store), DEFAULT_WORKERS)
            .run(9)
            .await
            .unwrap();
        assert_eq!(report.query_timings.len(), 4);
    }

    #[tokio::test]
    async fn test_run_without_facts_returns_no_data() {
        let mut store = store_with_facts(0);
        store.expect_aggregate_rows().never();

        let err = HealthAggregator::new(Arc::new(store), DEFAULT_WORKERS)
            .run(2)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoData { days: 2 }));
    }

    #[tokio::test]
    async fn test_one_failing_aggregate_fails_the_report() {
        let mut store = store_with_facts(10);
        store.expect_aggregate_rows().returning(|kind, _| {
            if kind == AggregateKind::Dimensions {
                Err(CoreError::Internal("relation \"dq_dimension\" does not exist".to_string()))
            } else {
                Ok(aggregate_fixture(kind))
            }
        });

        let result = HealthAggregator::new(Arc::new(store), DEFAULT_WORKERS)
            .run(2)
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("dq_dimension"));
    }

    /// Store whose dimension query fails at once while the others take a while
    struct SlowSiblingsStore {
        completed: AtomicUsize,
    }

    #[async_trait]
    impl DqStore for SlowSiblingsStore {
        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn list_breaking_datasets(&self, _: NaiveDateTime) -> Result<Vec<BreakingDataset>> {
            Ok(vec![])
        }

        async fn dataset_exists(&self, _: &str) -> Result<bool> {
            Ok(false)
        }

        async fn fetch_header(&self, _: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn count_breaks(&self, _: &str, _: NaiveDateTime) -> Result<i64> {
            Ok(0)
        }

        async fn fetch_break_rows(&self, _: &BreakPageQuery) -> Result<Vec<Value>> {
            Ok(vec![])
        }

        async fn count_health_facts(&self, _: i32) -> Result<i64> {
            Ok(10)
        }

        async fn aggregate_rows(&self, kind: AggregateKind, _: i32) -> Result<Vec<Value>> {
            if kind == AggregateKind::Dimensions {
                return Err(CoreError::Internal("dimension query failed".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(aggregate_fixture(kind))
        }

        async fn table_columns(&self, _: &str) -> Result<Vec<ColumnMeta>> {
            Ok(vec![])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_aggregate_waits_for_siblings() {
        let store = Arc::new(SlowSiblingsStore {
            completed: AtomicUsize::new(0),
        });

        let err = HealthAggregator::new(store.clone(), DEFAULT_WORKERS)
            .run(2)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("dimension query failed"));
        assert_eq!(store.completed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_undecodable_aggregate_fails_the_report() {
        let mut store = store_with_facts(10);
        store.expect_aggregate_rows().returning(|kind, _| {
            if kind == AggregateKind::TimeSeries {
                Ok(vec![json!({"cnt": "many"})])
            } else {
                Ok(aggregate_fixture(kind))
            }
        });

        let err = HealthAggregator::new(Arc::new(store), DEFAULT_WORKERS)
            .run(2)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_single_worker_still_completes() {
        let mut store = store_with_facts(10);
        store
            .expect_aggregate_rows()
            .times(4)
            .returning(|kind, _| Ok(aggregate_fixture(kind)));

        let report = HealthAggregator::new(Arc::new(store), 1).run(2).await.unwrap();
        assert_eq!(report.query_timings.len(), 4);
    }
}
