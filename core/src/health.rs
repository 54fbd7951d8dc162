//! Health dashboard aggregate queries
//!
//! All four aggregates are built on the same base relation `f`: one row per
//! rule evaluation in the window, classified as PASSING, EXCEPTION or
//! BREAKING and tagged with its dimension and business unit. Every query
//! binds the lookback window in days as `$1`.

use serde::{Deserialize, Serialize};

use crate::domain::HealthStatus;

/// Label used when a fact has no dimension or business unit
pub const UNSPECIFIED: &str = "UNSPECIFIED";

/// Rule evaluations in `[today - $1 days, today + 1 day]`
pub const COUNT_FACTS_SQL: &str = r#"
    SELECT COUNT(*) AS cnt
    FROM public.rule_output
    WHERE run_id::date >= NOW()::date - ($1::int * INTERVAL '1 day')
    AND run_id::date <= NOW()::date + INTERVAL '1 day'
"#;

/// Status classification. The branches are evaluated in order; a fact with
/// a positive score and a one-character exception matches none of them.
const STATUS_CASE: &str = r#"(CASE
                WHEN a.score = 0 AND (a.exception IS NULL OR a.exception = '') THEN 'PASSING'
                WHEN length(a.exception) > 1 THEN 'EXCEPTION'
                WHEN a.score > 0 THEN 'BREAKING'
            END)"#;

/// The four aggregates served by the health dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregateKind {
    GlobalHealth,
    TimeSeries,
    Dimensions,
    BusinessUnits,
}

impl AggregateKind {
    pub const ALL: [AggregateKind; 4] = [
        AggregateKind::GlobalHealth,
        AggregateKind::TimeSeries,
        AggregateKind::Dimensions,
        AggregateKind::BusinessUnits,
    ];

    /// Response key of this aggregate
    pub fn key(&self) -> &'static str {
        match self {
            AggregateKind::GlobalHealth => "globalHealth",
            AggregateKind::TimeSeries => "timeSeries",
            AggregateKind::Dimensions => "dimensions",
            AggregateKind::BusinessUnits => "businessUnits",
        }
    }

    /// Full SQL of this aggregate, base CTE included
    pub fn sql(&self) -> String {
        let base = base_cte();
        match self {
            AggregateKind::GlobalHealth => {
                let statuses = HealthStatus::ALL
                    .iter()
                    .map(|s| format!("'{}'", s.as_str()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    r#"{base},
    all_statuses AS (
        SELECT unnest(ARRAY[{statuses}]) AS pass_fail_exception
    ),
    health_counts AS (
        SELECT pass_fail_exception, COUNT(*) AS cnt
        FROM f
        WHERE run_date >= (SELECT max(run_date) FROM f) - ($1::int * INTERVAL '1 day')
        GROUP BY pass_fail_exception
    )
    SELECT
        s.pass_fail_exception,
        COALESCE(h.cnt, 0) AS cnt,
        COALESCE(CAST(h.cnt AS DOUBLE PRECISION) / NULLIF((SELECT SUM(cnt) FROM health_counts), 0), 0) AS ratio
    FROM all_statuses s
    LEFT JOIN health_counts h ON s.pass_fail_exception = h.pass_fail_exception
    ORDER BY s.pass_fail_exception
"#
                )
            }
            AggregateKind::TimeSeries => format!(
                r#"{base}
    SELECT pass_fail_exception, COUNT(*) AS cnt, run_date AS run_id
    FROM f
    WHERE run_date >= (SELECT max(run_date) FROM f) - ($1::int * INTERVAL '1 day')
    GROUP BY pass_fail_exception, run_date
    ORDER BY run_date ASC, pass_fail_exception
"#
            ),
            AggregateKind::Dimensions => format!(
                r#"{base}
    SELECT dim_name AS dimension, pass_fail_exception, COUNT(*) AS cnt
    FROM f
    WHERE run_date >= (SELECT max(run_date) FROM f) - ($1::int * INTERVAL '1 day')
    GROUP BY dim_name, pass_fail_exception
    ORDER BY dim_name, pass_fail_exception
"#
            ),
            AggregateKind::BusinessUnits => format!(
                r#"{base}
    SELECT COALESCE(business_unit, '{UNSPECIFIED}') AS biz_unit, pass_fail_exception, COUNT(*) AS cnt
    FROM f
    WHERE run_date >= (SELECT max(run_date) FROM f) - ($1::int * INTERVAL '1 day')
    GROUP BY business_unit, pass_fail_exception
    ORDER BY business_unit, pass_fail_exception
"#
            ),
        }
    }
}

impl std::fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Shared CTE chain ending in the classified fact relation `f`
fn base_cte() -> String {
    format!(
        r#"
    WITH a AS (
        SELECT * FROM public.rule_output
        WHERE run_id::date >= NOW()::date - ($1::int * INTERVAL '1 day')
        AND run_id::date <= NOW()::date + INTERVAL '1 day'
    ),
    b AS (
        SELECT * FROM public.dataset_scan
        WHERE rc > 1
        AND run_id::date >= NOW()::date - ($1::int * INTERVAL '1 day')
    ),
    c AS (
        SELECT * FROM public.owl_rule
    ),
    e AS (
        SELECT * FROM public.dq_dimension
    ),
    g AS (
        SELECT * FROM public.owl_catalog
    ),
    h AS (
        SELECT * FROM public.business_unit_to_dataset
    ),
    i AS (
        SELECT * FROM public.business_units
    ),
    j AS (
        SELECT DISTINCT dataset, col_nm, col_semantic
        FROM public.dataset_schema
        WHERE updated_at >= NOW() - ($1::int * INTERVAL '1 day')
    ),
    f AS (
        SELECT
            a.dataset,
            a.rule_nm,
            a.score AS rule_point,
            {STATUS_CASE} AS pass_fail_exception,
            COALESCE(e.dim_name, '{UNSPECIFIED}') AS dim_name,
            i.name AS business_unit,
            a.run_id::date AS run_date
        FROM a
        LEFT JOIN b ON a.dataset = b.dataset AND a.run_id::date = b.run_id::date
        INNER JOIN c ON a.dataset = c.dataset AND a.rule_nm = c.rule_nm
        LEFT JOIN e ON e.dim_id = c.dim_id
        INNER JOIN g ON g.dataset = a.dataset
        LEFT JOIN h ON h.dataset = g.dataset
        LEFT JOIN i ON i.id = h.id
        LEFT JOIN j ON a.dataset = j.dataset AND c.column_name = j.col_nm
    )"#
    )
}
