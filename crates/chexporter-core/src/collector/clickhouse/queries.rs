//! SQL for the ClickHouse system tables behind each category.

use crate::collector::MetricCategory;

const QUERY_METRICS_SQL: &str = r#"
    SELECT
        metric,
        toFloat64(value) AS value,
        'gauge' AS type
    FROM system.asynchronous_metrics
    UNION ALL
    SELECT
        concat('metric.', metric) AS metric,
        toFloat64(value) AS value,
        'gauge' AS type
    FROM system.metrics
    UNION ALL
    SELECT
        concat('event.', event) AS metric,
        toFloat64(value) AS value,
        'counter' AS type
    FROM system.events
    UNION ALL
    SELECT
        'metric.DiskDataBytes' AS metric,
        toFloat64(sum(bytes_on_disk)) AS value,
        'gauge' AS type
    FROM system.parts
    WHERE active
    UNION ALL
    SELECT
        'metric.MemoryPrimaryKeyBytesAllocated' AS metric,
        toFloat64(sum(primary_key_bytes_in_memory_allocated)) AS value,
        'gauge' AS type
    FROM system.parts
    WHERE active
"#;

const TABLE_SIZES_SQL: &str = r#"
    SELECT
        database,
        table,
        toUInt8(active) AS active,
        uniq(partition) AS partitions,
        count() AS parts,
        sum(bytes_on_disk) AS bytes,
        sum(data_uncompressed_bytes) AS uncompressed_bytes,
        sum(rows) AS rows
    FROM system.parts
    GROUP BY database, table, active
    ORDER BY database, table, active
"#;

const SYSTEM_REPLICAS_SQL: &str = r#"
    SELECT
        database,
        table,
        toUInt8(is_session_expired) AS is_session_expired
    FROM system.replicas
    ORDER BY database, table
"#;

const MUTATIONS_SQL: &str = r#"
    SELECT
        database,
        table,
        count() AS mutations,
        toUInt64(sum(parts_to_do)) AS parts_to_do
    FROM system.mutations
    WHERE is_done = 0
    GROUP BY database, table
    ORDER BY database, table
"#;

/// Output format appended to every query; one JSON object per row.
pub(super) const OUTPUT_FORMAT: &str = "JSONEachRow";

/// Builds the request body for `category`.
pub(super) fn build_category_query(category: MetricCategory) -> String {
    let sql = match category {
        MetricCategory::QueryMetrics => QUERY_METRICS_SQL,
        MetricCategory::TableSizes => TABLE_SIZES_SQL,
        MetricCategory::SystemReplicas => SYSTEM_REPLICAS_SQL,
        MetricCategory::Mutations => MUTATIONS_SQL,
    };
    format!("{}FORMAT {}", sql.trim_start(), OUTPUT_FORMAT)
}
