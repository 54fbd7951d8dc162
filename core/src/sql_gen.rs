//! SQL generation for row-level break decoding

use crate::domain::HeaderDescriptor;
use crate::headers::LINK_ID_DELIMITER;

/// Most rows the break count will look at
pub const MAX_COUNTED_BREAKS: i64 = 1_000_000;

/// Header existence check against the header source table
pub const DATASET_EXISTS_SQL: &str =
    "SELECT EXISTS(SELECT 1 FROM opt_owl WHERE dataset = $1)";

/// Raw header string of a dataset; rows with a link id win over empty ones
pub const FETCH_HEADER_SQL: &str = r#"
    SELECT COALESCE(linkid, '') AS linkid
    FROM opt_owl
    WHERE dataset = $1
    ORDER BY linkid IS NULL
    LIMIT 1
"#;

/// Break count for one dataset since a threshold, capped at `MAX_COUNTED_BREAKS`
pub const COUNT_BREAKS_SQL: &str = r#"
    SELECT COUNT(*) AS cnt
    FROM (
        SELECT 1
        FROM rule_breaks
        WHERE dataset = $1
        AND run_id >= $2
        LIMIT $3
    ) capped
"#;

/// Datasets whose latest run has breaking rules and which have breaks since `$1`
pub const LIST_BREAKING_DATASETS_SQL: &str = r#"
    WITH li AS (
        SELECT * FROM opt_owl WHERE linkid IS NOT NULL
    ),
    lr AS (
        SELECT max(run_id) AS run_id, dataset
        FROM rule_output
        GROUP BY dataset
    )
    SELECT DISTINCT ro.dataset, ro.run_id::timestamp AS run_id, li.linkid
    FROM li
    INNER JOIN rule_output ro ON li.dataset = ro.dataset
    INNER JOIN lr ON lr.dataset = ro.dataset AND lr.run_id = ro.run_id
    WHERE ro.score > 0
    AND ro.dataset IN (
        SELECT dataset
        FROM rule_breaks
        WHERE run_id >= $1
    )
    ORDER BY ro.dataset, run_id
"#;

/// Latest breaking run of a single dataset (echoed to clients for debugging)
pub const DATASET_LIST_QUERY: &str = r#"
    WITH li AS (
        SELECT * FROM opt_owl WHERE linkid IS NOT NULL
    ),
    lr AS (
        SELECT max(run_id) AS run_id, dataset
        FROM rule_output
        GROUP BY dataset
    )
    SELECT DISTINCT ro.dataset, ro.run_id, li.linkid
    FROM li
    INNER JOIN rule_output ro ON li.dataset = ro.dataset
    INNER JOIN lr ON lr.dataset = ro.dataset AND lr.run_id = ro.run_id
    WHERE ro.score > 0
    AND ro.dataset = $1
    AND ro.run_id >= $2
    ORDER BY ro.dataset, ro.run_id
"#;

/// Dynamic SELECT list decoding a break payload array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// Output column names in header order
    pub columns: Vec<String>,
    /// `d.value[i] AS "name"` expressions joined by commas
    pub select_list: String,
}

/// PostgreSQL's NAMEDATALEN - 1; longer identifiers are cut by the server
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// SQL generator for the break decoding query
pub struct SqlGenerator;

impl SqlGenerator {
    /// Replace every character outside the identifier allow-list with `_`
    ///
    /// The result is cut to [`MAX_IDENTIFIER_BYTES`] on a character boundary,
    /// so the alias sent to the server is the key it hands back.
    pub fn sanitize_identifier(name: &str) -> String {
        let mut sanitized: String = name
            .trim()
            .chars()
            .map(|c| {
                if c.is_alphanumeric()
                    || matches!(
                        c,
                        '_' | ' ' | '-' | '.' | '/' | '#' | '$' | '%' | '(' | ')' | ':' | '&' | '+'
                    )
                {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if sanitized.len() > MAX_IDENTIFIER_BYTES {
            let mut cut = MAX_IDENTIFIER_BYTES;
            while !sanitized.is_char_boundary(cut) {
                cut -= 1;
            }
            sanitized.truncate(cut);
        }
        sanitized
    }

    /// Double-quote an already sanitized identifier
    pub fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Map payload array positions to named output columns
    ///
    /// Names that collide after sanitizing are all emitted; the row object
    /// keeps whichever comes last.
    pub fn build_projection(header: &HeaderDescriptor) -> Projection {
        let mut columns = Vec::with_capacity(header.columns.len());
        let mut expressions = Vec::with_capacity(header.columns.len());

        for column in &header.columns {
            let name = Self::sanitize_identifier(&column.name);
            if name.trim().is_empty() {
                continue;
            }
            expressions.push(format!(
                "d.value[{}] AS {}",
                column.position,
                Self::quote_identifier(&name)
            ));
            columns.push(name);
        }

        Projection {
            columns,
            select_list: expressions.join(", "),
        }
    }

    /// Windowed break query for one dataset
    ///
    /// Binds: `$1` dataset, `$2` run threshold, `$3` limit, `$4` offset.
    pub fn generate_parse_query(projection: &Projection) -> String {
        let extra_columns = if projection.select_list.is_empty() {
            String::new()
        } else {
            format!(", {}", projection.select_list)
        };

        format!(
            r#"
    WITH break_values AS (
        SELECT dataset, run_id, rule_nm,
        string_to_array(link_id, '{}') AS value
        FROM rule_breaks
        WHERE dataset = $1
        AND run_id >= $2
        ORDER BY run_id DESC
        LIMIT $3 OFFSET $4
    )
    SELECT d.dataset, d.run_id, d.rule_nm{}
    FROM break_values d
    ORDER BY d.run_id DESC
"#,
            LINK_ID_DELIMITER, extra_columns
        )
    }

    /// Wrap a query so every result row comes back as one JSON object
    pub fn wrap_as_json_rows(query: &str) -> String {
        format!(
            "SELECT to_jsonb(q.*) AS row_data FROM ({}) q",
            query.trim_end()
        )
    }
}
