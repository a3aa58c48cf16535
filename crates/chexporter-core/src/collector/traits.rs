//! Abstractions over the query side of a scrape.
//!
//! The `Fetcher` trait lets the exporter run against a real ClickHouse server
//! over HTTP or against scripted responses in tests.

use super::category::MetricCategory;
use super::rows::{CategoryRows, MutationRow, QueryMetricRow, ReplicaRow, TableSizeRow};
use crate::target::TargetDescriptor;

/// Error type for a single category fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Host unreachable, request timed out or credentials rejected.
    Connectivity(String),
    /// Query rejected by the server or response could not be decoded.
    Query(String),
}

impl FetchError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, FetchError::Connectivity(_))
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Connectivity(msg) => write!(f, "ClickHouse: {}", msg),
            FetchError::Query(msg) => write!(f, "ClickHouse query error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// Runs the read-only query of each category against one host.
///
/// Every call issues exactly one query and never retries. Implementations
/// bound their own latency; the exporter waits for whatever they return.
pub trait Fetcher {
    fn query_metrics(&mut self) -> Result<Vec<QueryMetricRow>, FetchError>;

    fn table_sizes(&mut self) -> Result<Vec<TableSizeRow>, FetchError>;

    fn system_replicas(&mut self) -> Result<Vec<ReplicaRow>, FetchError>;

    fn mutations(&mut self) -> Result<Vec<MutationRow>, FetchError>;

    /// Dispatches to the operation for `category`.
    fn fetch(&mut self, category: MetricCategory) -> Result<CategoryRows, FetchError> {
        match category {
            MetricCategory::QueryMetrics => self.query_metrics().map(CategoryRows::QueryMetrics),
            MetricCategory::TableSizes => self.table_sizes().map(CategoryRows::TableSizes),
            MetricCategory::SystemReplicas => {
                self.system_replicas().map(CategoryRows::SystemReplicas)
            }
            MetricCategory::Mutations => self.mutations().map(CategoryRows::Mutations),
        }
    }
}

/// Builds a fresh `Fetcher` for every scrape.
pub trait FetcherFactory: Send + Sync {
    type Fetcher: Fetcher;

    /// Creates a fetcher bound to `target`.
    ///
    /// A construction failure is reported like a failed first fetch.
    fn new_fetcher(&self, target: &TargetDescriptor) -> Result<Self::Fetcher, FetchError>;
}
