//! Conversion of ClickHouse rows into Prometheus samples.
//!
//! All metric names carry the `chi_clickhouse_` prefix and every sample is
//! labelled with the scraped `hostname`.
//!
//! | category | metrics | extra labels |
//! |---|---|---|
//! | query metrics | one per row, name derived from the row | — |
//! | table sizes | `table_partitions`, `table_parts`, `table_parts_bytes`, `table_parts_bytes_uncompressed`, `table_parts_rows` | database, table, active |
//! | replicas | `system_replicas_is_session_expired` | database, table |
//! | mutations | `table_mutations`, `table_mutations_parts_to_do` | database, table |
//! | fetch marker | `metric_fetch_success` | category |

use prometheus::core::Collector as _;
use prometheus::{Counter, Gauge, GaugeVec, Opts};
use tracing::{debug, warn};

use super::sink::{MetricSample, MetricSink, SinkClosed};
use crate::collector::{
    CategoryRows, MetricCategory, MutationRow, QueryMetricRow, ReplicaRow, SampleKind,
    TableSizeRow,
};

pub const METRIC_PREFIX: &str = "chi_clickhouse_";

/// Full name of the per-category fetch marker.
pub const FETCH_MARKER_METRIC: &str = "chi_clickhouse_metric_fetch_success";

const FETCH_MARKER_HELP: &str =
    "Whether the latest fetch of the category succeeded (1) or failed (0)";

/// Column extractor for gauge vectors.
type Column<R> = (&'static str, &'static str, fn(&R) -> f64);

/// Writes the samples of one scrape into a sink.
///
/// Created per scrape and bound to the target hostname.
pub struct PrometheusWriter<'a> {
    sink: &'a mut dyn MetricSink,
    hostname: &'a str,
}

impl<'a> PrometheusWriter<'a> {
    pub fn new(sink: &'a mut dyn MetricSink, hostname: &'a str) -> Self {
        Self { sink, hostname }
    }

    /// Writes the rows of one category; returns the number of samples emitted.
    pub fn write_category(&mut self, rows: &CategoryRows) -> Result<usize, SinkClosed> {
        match rows {
            CategoryRows::QueryMetrics(rows) => self.write_query_metrics(rows),
            CategoryRows::TableSizes(rows) => self.write_table_sizes(rows),
            CategoryRows::SystemReplicas(rows) => self.write_system_replicas(rows),
            CategoryRows::Mutations(rows) => self.write_mutations(rows),
        }
    }

    pub fn write_query_metrics(&mut self, rows: &[QueryMetricRow]) -> Result<usize, SinkClosed> {
        let mut written = 0;
        for row in rows {
            let Some(value) = row.value else {
                debug!(metric = %row.metric, "skipping metric without a finite value");
                continue;
            };
            let opts = self.opts(
                metric_name(&row.metric),
                format!("ClickHouse metric {}", row.metric),
            );
            let families = match row.kind {
                SampleKind::Gauge => Gauge::with_opts(opts).map(|g| {
                    g.set(value);
                    g.collect()
                }),
                SampleKind::Counter if value < 0.0 => {
                    debug!(metric = %row.metric, value, "skipping negative counter");
                    continue;
                }
                SampleKind::Counter => Counter::with_opts(opts).map(|c| {
                    c.inc_by(value);
                    c.collect()
                }),
            };
            match families {
                Ok(families) => written += self.emit_all(families)?,
                Err(e) => debug!(metric = %row.metric, error = %e, "skipping invalid metric"),
            }
        }
        Ok(written)
    }

    pub fn write_table_sizes(&mut self, rows: &[TableSizeRow]) -> Result<usize, SinkClosed> {
        let columns: [Column<TableSizeRow>; 5] = [
            ("table_partitions", "Number of partitions of the table", |r| {
                r.partitions as f64
            }),
            ("table_parts", "Number of parts of the table", |r| r.parts as f64),
            ("table_parts_bytes", "Table size in bytes", |r| r.bytes as f64),
            (
                "table_parts_bytes_uncompressed",
                "Table size in bytes uncompressed",
                |r| r.uncompressed_bytes as f64,
            ),
            ("table_parts_rows", "Number of rows in the table", |r| {
                r.rows as f64
            }),
        ];
        self.write_gauge_vecs(rows, &["database", "table", "active"], &columns, |r| {
            vec![r.database.clone(), r.table.clone(), r.active.to_string()]
        })
    }

    pub fn write_system_replicas(&mut self, rows: &[ReplicaRow]) -> Result<usize, SinkClosed> {
        let columns: [Column<ReplicaRow>; 1] = [(
            "system_replicas_is_session_expired",
            "Number of expired Zookeeper sessions of the table",
            |r| r.is_session_expired as f64,
        )];
        self.write_gauge_vecs(rows, &["database", "table"], &columns, |r| {
            vec![r.database.clone(), r.table.clone()]
        })
    }

    pub fn write_mutations(&mut self, rows: &[MutationRow]) -> Result<usize, SinkClosed> {
        let columns: [Column<MutationRow>; 2] = [
            ("table_mutations", "Number of active mutations for the table", |r| {
                r.mutations as f64
            }),
            (
                "table_mutations_parts_to_do",
                "Number of data parts that need to be mutated for the mutation to finish",
                |r| r.parts_to_do as f64,
            ),
        ];
        self.write_gauge_vecs(rows, &["database", "table"], &columns, |r| {
            vec![r.database.clone(), r.table.clone()]
        })
    }

    /// Records that the latest fetch of `category` succeeded.
    pub fn write_success_marker(&mut self, category: MetricCategory) -> Result<(), SinkClosed> {
        self.write_marker(category, 1.0)
    }

    /// Records that the latest fetch of `category` failed.
    pub fn write_failure_marker(&mut self, category: MetricCategory) -> Result<(), SinkClosed> {
        self.write_marker(category, 0.0)
    }

    fn write_marker(&mut self, category: MetricCategory, value: f64) -> Result<(), SinkClosed> {
        let opts = self
            .opts(FETCH_MARKER_METRIC.to_string(), FETCH_MARKER_HELP)
            .const_label("category", category.name());
        match Gauge::with_opts(opts) {
            Ok(gauge) => {
                gauge.set(value);
                self.emit_all(gauge.collect()).map(|_| ())
            }
            Err(e) => {
                warn!(category = %category, error = %e, "failed to build fetch marker");
                Ok(())
            }
        }
    }

    /// One gauge vector per column, one child per row.
    fn write_gauge_vecs<R>(
        &mut self,
        rows: &[R],
        labels: &[&str],
        columns: &[Column<R>],
        label_values: fn(&R) -> Vec<String>,
    ) -> Result<usize, SinkClosed> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut written = 0;
        for (name, help, value) in columns {
            let full_name = format!("{}{}", METRIC_PREFIX, name);
            let vec = match GaugeVec::new(self.opts(full_name, *help), labels) {
                Ok(vec) => vec,
                Err(e) => {
                    warn!(metric = name, error = %e, "failed to build gauge vector");
                    continue;
                }
            };
            for row in rows {
                let values = label_values(row);
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                match vec.get_metric_with_label_values(&values) {
                    Ok(gauge) => gauge.set(value(row)),
                    Err(e) => debug!(metric = name, error = %e, "skipping row"),
                }
            }
            written += self.emit_all(vec.collect())?;
        }
        Ok(written)
    }

    /// Options for a fully prefixed metric labelled with the hostname.
    fn opts(&self, full_name: String, help: impl Into<String>) -> Opts {
        Opts::new(full_name, help).const_label("hostname", self.hostname)
    }

    /// Emits the non-empty families; returns how many were emitted.
    fn emit_all(&mut self, families: Vec<MetricSample>) -> Result<usize, SinkClosed> {
        let mut emitted = 0;
        for family in families {
            if family.get_metric().is_empty() {
                continue;
            }
            self.sink.emit(family)?;
            emitted += 1;
        }
        Ok(emitted)
    }
}

/// Prometheus name for a ClickHouse metric, e.g. `event.SelectQuery` becomes
/// `chi_clickhouse_event_SelectQuery`.
pub fn metric_name(metric: &str) -> String {
    format!("{}{}", METRIC_PREFIX, sanitize(metric))
}

fn sanitize(metric: &str) -> String {
    metric
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
