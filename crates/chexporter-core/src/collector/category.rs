//! The fixed, ordered set of query categories.

use std::fmt;

/// One group of related ClickHouse queries.
///
/// The declaration order is the scrape order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricCategory {
    /// `system.asynchronous_metrics`, `system.metrics`, `system.events` and part totals.
    QueryMetrics,
    /// Per-table partition, part, byte and row counts from `system.parts`.
    TableSizes,
    /// Session state of replicated tables from `system.replicas`.
    SystemReplicas,
    /// Unfinished mutations from `system.mutations`.
    Mutations,
}

impl MetricCategory {
    /// All categories in scrape order.
    pub const ALL: [MetricCategory; 4] = [
        MetricCategory::QueryMetrics,
        MetricCategory::TableSizes,
        MetricCategory::SystemReplicas,
        MetricCategory::Mutations,
    ];

    /// Value of the `category` label on the fetch marker.
    pub fn name(self) -> &'static str {
        match self {
            MetricCategory::QueryMetrics => "system.metrics",
            MetricCategory::TableSizes => "table sizes",
            MetricCategory::SystemReplicas => "system.replicas",
            MetricCategory::Mutations => "system.mutations",
        }
    }

    /// Position in the scrape order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Reverse of [`MetricCategory::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
