//! Pre-built ClickHouse server scenarios for testing.

use super::fetcher::{MockFetcher, MockFetcherFactory};
use crate::collector::category::MetricCategory;
use crate::collector::rows::{
    CategoryRows, MutationRow, QueryMetricRow, ReplicaRow, SampleKind, TableSizeRow,
};
use crate::collector::traits::FetchError;

impl MockFetcher {
    /// A healthy server with a handful of rows in every category.
    pub fn healthy_server() -> Self {
        Self::new()
            .with_rows(CategoryRows::QueryMetrics(vec![
                QueryMetricRow {
                    metric: "Uptime".to_string(),
                    value: Some(86400.0),
                    kind: SampleKind::Gauge,
                },
                QueryMetricRow {
                    metric: "metric.Query".to_string(),
                    value: Some(3.0),
                    kind: SampleKind::Gauge,
                },
                QueryMetricRow {
                    metric: "event.SelectQuery".to_string(),
                    value: Some(15230.0),
                    kind: SampleKind::Counter,
                },
                QueryMetricRow {
                    metric: "metric.DiskDataBytes".to_string(),
                    value: Some(52_428_800.0),
                    kind: SampleKind::Gauge,
                },
            ]))
            .with_rows(CategoryRows::TableSizes(vec![
                TableSizeRow {
                    database: "default".to_string(),
                    table: "events".to_string(),
                    active: 1,
                    partitions: 3,
                    parts: 9,
                    bytes: 41_943_040,
                    uncompressed_bytes: 167_772_160,
                    rows: 2_500_000,
                },
                TableSizeRow {
                    database: "default".to_string(),
                    table: "events".to_string(),
                    active: 0,
                    partitions: 1,
                    parts: 2,
                    bytes: 1_048_576,
                    uncompressed_bytes: 4_194_304,
                    rows: 10_000,
                },
            ]))
            .with_rows(CategoryRows::SystemReplicas(vec![ReplicaRow {
                database: "default".to_string(),
                table: "events".to_string(),
                is_session_expired: 0,
            }]))
            .with_rows(CategoryRows::Mutations(vec![MutationRow {
                database: "default".to_string(),
                table: "events".to_string(),
                mutations: 1,
                parts_to_do: 4,
            }]))
    }

    /// A server that refuses every connection.
    pub fn unreachable_server() -> Self {
        MetricCategory::ALL.into_iter().fold(Self::new(), |f, c| {
            f.with_error(c, FetchError::Connectivity("connection refused".to_string()))
        })
    }

    /// A healthy server whose `category` query fails with `error`.
    pub fn failing_at(category: MetricCategory, error: FetchError) -> Self {
        Self::healthy_server().with_error(category, error)
    }

    /// Empty query metrics and table sizes, then the host drops off at replicas.
    pub fn empty_tables_then_replica_outage() -> Self {
        Self::healthy_server()
            .with_rows(CategoryRows::empty(MetricCategory::QueryMetrics))
            .with_rows(CategoryRows::empty(MetricCategory::TableSizes))
            .with_error(
                MetricCategory::SystemReplicas,
                FetchError::Connectivity("connection refused".to_string()),
            )
    }
}

impl MockFetcherFactory {
    pub fn healthy_server() -> Self {
        Self::new(MockFetcher::healthy_server())
    }

    pub fn unreachable_server() -> Self {
        Self::new(MockFetcher::unreachable_server())
    }

    pub fn failing_at(category: MetricCategory, error: FetchError) -> Self {
        Self::new(MockFetcher::failing_at(category, error))
    }
}
