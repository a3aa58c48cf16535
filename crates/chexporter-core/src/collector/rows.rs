//! Row types returned by each category query.
//!
//! Field names match the column aliases in `clickhouse::queries`, so every
//! `JSONEachRow` line decodes straight into one of these structs.

use serde::Deserialize;

use super::category::MetricCategory;

/// Prometheus type a query-metrics row should be exported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Gauge,
    Counter,
}

/// One value from `system.metrics`, `system.events` or `system.asynchronous_metrics`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryMetricRow {
    pub metric: String,
    /// ClickHouse renders NaN and infinities as `null`.
    pub value: Option<f64>,
    #[serde(rename = "type")]
    pub kind: SampleKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableSizeRow {
    pub database: String,
    pub table: String,
    pub active: u8,
    pub partitions: u64,
    pub parts: u64,
    pub bytes: u64,
    pub uncompressed_bytes: u64,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReplicaRow {
    pub database: String,
    pub table: String,
    pub is_session_expired: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MutationRow {
    pub database: String,
    pub table: String,
    pub mutations: u64,
    pub parts_to_do: u64,
}

/// The full row set of one successful category fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryRows {
    QueryMetrics(Vec<QueryMetricRow>),
    TableSizes(Vec<TableSizeRow>),
    SystemReplicas(Vec<ReplicaRow>),
    Mutations(Vec<MutationRow>),
}

impl CategoryRows {
    /// An empty row set for `category`.
    pub fn empty(category: MetricCategory) -> Self {
        match category {
            MetricCategory::QueryMetrics => CategoryRows::QueryMetrics(Vec::new()),
            MetricCategory::TableSizes => CategoryRows::TableSizes(Vec::new()),
            MetricCategory::SystemReplicas => CategoryRows::SystemReplicas(Vec::new()),
            MetricCategory::Mutations => CategoryRows::Mutations(Vec::new()),
        }
    }

    pub fn category(&self) -> MetricCategory {
        match self {
            CategoryRows::QueryMetrics(_) => MetricCategory::QueryMetrics,
            CategoryRows::TableSizes(_) => MetricCategory::TableSizes,
            CategoryRows::SystemReplicas(_) => MetricCategory::SystemReplicas,
            CategoryRows::Mutations(_) => MetricCategory::Mutations,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CategoryRows::QueryMetrics(rows) => rows.len(),
            CategoryRows::TableSizes(rows) => rows.len(),
            CategoryRows::SystemReplicas(rows) => rows.len(),
            CategoryRows::Mutations(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
