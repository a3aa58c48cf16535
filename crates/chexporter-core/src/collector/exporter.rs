//! The scrape orchestrator.
//!
//! `Exporter` holds the only state shared between scrapes, the immutable
//! `TargetDescriptor`. Each call to `collect` builds its own fetcher and
//! writer, walks `MetricCategory::ALL` in order and stops at the first failed
//! category after recording its failure marker.

use std::time::{Duration, Instant};

use tracing::debug;

use super::category::MetricCategory;
use super::traits::{FetchError, Fetcher, FetcherFactory};
use crate::metrics::{Collector, MetricSink, PrometheusWriter, SinkClosed};
use crate::target::TargetDescriptor;

/// How one category ended within a scrape.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryStatus {
    Succeeded { rows: usize },
    Failed(FetchError),
}

/// Summary of one scrape, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeReport {
    /// Categories attempted, in scrape order. Categories after a failure are absent.
    pub categories: Vec<(MetricCategory, CategoryStatus)>,
    /// Data samples emitted, markers excluded.
    pub samples: usize,
    pub elapsed: Duration,
}

impl ScrapeReport {
    /// The category that stopped the scrape, if any.
    pub fn failed_category(&self) -> Option<MetricCategory> {
        self.categories.iter().find_map(|(c, s)| match s {
            CategoryStatus::Failed(_) => Some(*c),
            CategoryStatus::Succeeded { .. } => None,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.categories.len() == MetricCategory::ALL.len() && self.failed_category().is_none()
    }
}

/// Collector for one ClickHouse host.
pub struct Exporter<F: FetcherFactory> {
    target: TargetDescriptor,
    factory: F,
}

impl<F: FetcherFactory> Exporter<F> {
    pub fn new(target: TargetDescriptor, factory: F) -> Self {
        Self { target, factory }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Runs one scrape into `sink`.
    ///
    /// Returns `Err(SinkClosed)` if the sink closed mid-scrape; nothing more is
    /// attempted in that case. A closed sink on entry returns an empty report
    /// without building a fetcher.
    pub fn scrape(&self, sink: &mut dyn MetricSink) -> Result<ScrapeReport, SinkClosed> {
        let start = Instant::now();
        let mut report = ScrapeReport::default();

        if !sink.is_open() {
            return Ok(report);
        }

        let hostname = self.target.hostname();
        let mut writer = PrometheusWriter::new(sink, hostname);

        let mut fetcher = match self.factory.new_fetcher(&self.target) {
            Ok(fetcher) => fetcher,
            Err(e) => {
                // No fetcher means the first category cannot be queried.
                let first = MetricCategory::ALL[0];
                debug!(host = hostname, error = %e, "failed to create fetcher");
                writer.write_failure_marker(first)?;
                report.categories.push((first, CategoryStatus::Failed(e)));
                report.elapsed = start.elapsed();
                return Ok(report);
            }
        };

        for category in MetricCategory::ALL {
            debug!(host = hostname, category = %category, "querying");
            match fetcher.fetch(category) {
                Ok(rows) => {
                    debug!(host = hostname, category = %category, rows = rows.len(), "extracted");
                    report.samples += writer.write_category(&rows)?;
                    writer.write_success_marker(category)?;
                    report.categories.push((
                        category,
                        CategoryStatus::Succeeded { rows: rows.len() },
                    ));
                }
                Err(e) => {
                    debug!(host = hostname, category = %category, error = %e, "query failed");
                    writer.write_failure_marker(category)?;
                    report.categories.push((category, CategoryStatus::Failed(e)));
                    break;
                }
            }
        }

        report.elapsed = start.elapsed();
        Ok(report)
    }
}

impl<F: FetcherFactory> Collector for Exporter<F> {
    fn collect(&self, sink: &mut dyn MetricSink) {
        if !sink.is_open() {
            debug!("metric sink is closed, skipping collect");
            return;
        }

        debug!(host = self.target.hostname(), "starting collect");
        match self.scrape(sink) {
            Ok(report) => debug!(
                host = self.target.hostname(),
                categories = report.categories.len(),
                samples = report.samples,
                complete = report.is_complete(),
                failed = ?report.failed_category(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "finished collect"
            ),
            Err(SinkClosed) => debug!(
                host = self.target.hostname(),
                "metric sink closed during collect, scrape aborted"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFetcher, MockFetcherFactory};
    use crate::metrics::{FETCH_MARKER_METRIC, MetricSample};
    use std::collections::BTreeSet;

    fn target() -> TargetDescriptor {
        TargetDescriptor::new("monitor", "secret", "ch-0.local", 8123)
    }

    /// Marker `(category, value)` pairs in emission order.
    fn markers(samples: &[MetricSample]) -> Vec<(MetricCategory, f64)> {
        samples
            .iter()
            .filter(|f| f.get_name() == FETCH_MARKER_METRIC)
            .flat_map(|f| f.get_metric().iter())
            .map(|m| {
                let category = m
                    .get_label()
                    .iter()
                    .find(|l| l.get_name() == "category")
                    .and_then(|l| MetricCategory::from_name(l.get_value()))
                    .unwrap();
                (category, m.get_gauge().get_value())
            })
            .collect()
    }

    /// Category a sample belongs to, from its name or marker label.
    fn sample_category(sample: &MetricSample) -> MetricCategory {
        let name = sample.get_name();
        if name == FETCH_MARKER_METRIC {
            return markers(std::slice::from_ref(sample))[0].0;
        }
        if name.starts_with("chi_clickhouse_table_mutations") {
            MetricCategory::Mutations
        } else if name.starts_with("chi_clickhouse_system_replicas") {
            MetricCategory::SystemReplicas
        } else if name.starts_with("chi_clickhouse_table_") {
            MetricCategory::TableSizes
        } else {
            MetricCategory::QueryMetrics
        }
    }

    fn data_samples(samples: &[MetricSample]) -> Vec<&MetricSample> {
        samples
            .iter()
            .filter(|f| f.get_name() != FETCH_MARKER_METRIC)
            .collect()
    }

    #[test]
    fn healthy_scrape_marks_every_category_in_order() {
        let exporter = Exporter::new(target(), MockFetcherFactory::healthy_server());
        let mut out: Vec<MetricSample> = Vec::new();
        exporter.collect(&mut out);

        assert_eq!(
            markers(&out),
            MetricCategory::ALL.iter().map(|c| (*c, 1.0)).collect::<Vec<_>>()
        );

        let order: Vec<usize> = out.iter().map(|s| sample_category(s).index()).collect();
        assert!(order.windows(2).all(|w| w[0] <= w[1]), "{:?}", order);
        let seen: BTreeSet<MetricCategory> = out.iter().map(sample_category).collect();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn failure_short_circuits_remaining_categories() {
        for (k, failing) in MetricCategory::ALL.into_iter().enumerate() {
            let factory = MockFetcherFactory::failing_at(
                failing,
                FetchError::Query("Code: 60. UNKNOWN_TABLE".into()),
            );
            let exporter = Exporter::new(target(), factory);
            let mut out: Vec<MetricSample> = Vec::new();
            let report = exporter.scrape(&mut out).unwrap();

            let mut expected: Vec<(MetricCategory, f64)> = MetricCategory::ALL[..k]
                .iter()
                .map(|c| (*c, 1.0))
                .collect();
            expected.push((failing, 0.0));
            assert_eq!(markers(&out), expected);

            assert!(out.iter().all(|s| sample_category(s).index() <= k));
            assert_eq!(report.failed_category(), Some(failing));
            assert_eq!(exporter.factory().calls(), MetricCategory::ALL[..=k].to_vec());
        }
    }

    #[test]
    fn empty_rows_then_connectivity_failure() {
        let factory = MockFetcherFactory::new(MockFetcher::empty_tables_then_replica_outage());
        let exporter = Exporter::new(target(), factory);
        let mut out: Vec<MetricSample> = Vec::new();
        let report = exporter.scrape(&mut out).unwrap();

        assert_eq!(
            markers(&out),
            vec![
                (MetricCategory::QueryMetrics, 1.0),
                (MetricCategory::TableSizes, 1.0),
                (MetricCategory::SystemReplicas, 0.0),
            ]
        );
        assert!(data_samples(&out).is_empty());
        assert_eq!(report.samples, 0);
        assert_eq!(
            report.categories[0],
            (MetricCategory::QueryMetrics, CategoryStatus::Succeeded { rows: 0 })
        );
        assert!(!exporter.factory().calls().contains(&MetricCategory::Mutations));
    }

    #[test]
    fn closed_sink_does_no_work() {
        let exporter = Exporter::new(target(), MockFetcherFactory::healthy_server());
        let (mut tx, rx) = tokio::sync::mpsc::unbounded_channel::<MetricSample>();
        drop(rx);

        exporter.collect(&mut tx);
        assert_eq!(exporter.factory().created(), 0);
        assert!(exporter.factory().calls().is_empty());
    }

    #[test]
    fn sink_closing_mid_scrape_aborts() {
        /// Sink that accepts a fixed number of samples, then closes.
        struct Budget {
            left: usize,
            taken: Vec<MetricSample>,
        }

        impl MetricSink for Budget {
            fn is_open(&self) -> bool {
                self.left > 0
            }

            fn emit(&mut self, sample: MetricSample) -> Result<(), SinkClosed> {
                if self.left == 0 {
                    return Err(SinkClosed);
                }
                self.left -= 1;
                self.taken.push(sample);
                Ok(())
            }
        }

        let exporter = Exporter::new(target(), MockFetcherFactory::healthy_server());
        let mut sink = Budget {
            left: 2,
            taken: Vec::new(),
        };
        assert_eq!(exporter.scrape(&mut sink), Err(SinkClosed));
        assert_eq!(sink.taken.len(), 2);
        assert_eq!(exporter.factory().calls(), vec![MetricCategory::QueryMetrics]);
    }

    #[test]
    fn describe_is_stable_against_unreachable_target() {
        let exporter = Exporter::new(target(), MockFetcherFactory::unreachable_server());
        let first = exporter.describe();
        let second = exporter.describe();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, FETCH_MARKER_METRIC);
        assert_eq!(
            first[0].label_names,
            vec!["category".to_string(), "hostname".to_string()]
        );
    }

    #[test]
    fn describe_lists_every_metric_of_healthy_target() {
        let exporter = Exporter::new(target(), MockFetcherFactory::healthy_server());
        let names: Vec<String> = exporter.describe().into_iter().map(|d| d.name).collect();

        assert!(names.contains(&FETCH_MARKER_METRIC.to_string()));
        assert!(names.contains(&"chi_clickhouse_table_parts_rows".to_string()));
        assert!(names.contains(&"chi_clickhouse_event_SelectQuery".to_string()));
        assert!(names.contains(&"chi_clickhouse_table_mutations_parts_to_do".to_string()));
    }

    #[test]
    fn marker_recovers_on_next_scrape() {
        let down = MockFetcher::failing_at(
            MetricCategory::TableSizes,
            FetchError::Connectivity("connection refused".into()),
        );
        let factory = MockFetcherFactory::rotating(vec![down, MockFetcher::healthy_server()]);
        let exporter = Exporter::new(target(), factory);

        let mut first: Vec<MetricSample> = Vec::new();
        exporter.collect(&mut first);
        assert!(markers(&first).contains(&(MetricCategory::TableSizes, 0.0)));

        let mut second: Vec<MetricSample> = Vec::new();
        exporter.collect(&mut second);
        assert!(markers(&second).contains(&(MetricCategory::TableSizes, 1.0)));
        assert!(!markers(&second).iter().any(|(_, v)| *v == 0.0));
    }

    #[test]
    fn fetcher_construction_failure_marks_first_category() {
        let factory = MockFetcherFactory::failing_construction(FetchError::Connectivity(
            "failed to build HTTP client".into(),
        ));
        let exporter = Exporter::new(target(), factory);
        let mut out: Vec<MetricSample> = Vec::new();
        let report = exporter.scrape(&mut out).unwrap();

        assert_eq!(markers(&out), vec![(MetricCategory::QueryMetrics, 0.0)]);
        assert_eq!(report.failed_category(), Some(MetricCategory::QueryMetrics));
    }

    #[test]
    fn concurrent_scrapes_keep_their_own_markers() {
        let factory = MockFetcherFactory::rotating(vec![
            MockFetcher::healthy_server(),
            MockFetcher::unreachable_server(),
        ]);
        let exporter = Exporter::new(target(), factory);

        let outputs: Vec<Vec<MetricSample>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let mut out: Vec<MetricSample> = Vec::new();
                        exporter.collect(&mut out);
                        out
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let healthy: Vec<(MetricCategory, f64)> =
            MetricCategory::ALL.iter().map(|c| (*c, 1.0)).collect();
        let unreachable = vec![(MetricCategory::QueryMetrics, 0.0)];

        let mut healthy_runs = 0;
        let mut unreachable_runs = 0;
        for out in &outputs {
            let m = markers(out);
            if m == healthy {
                healthy_runs += 1;
                assert!(!data_samples(out).is_empty());
            } else if m == unreachable {
                unreachable_runs += 1;
                assert!(data_samples(out).is_empty());
            } else {
                panic!("mixed markers: {:?}", m);
            }
        }
        assert_eq!(healthy_runs, 4);
        assert_eq!(unreachable_runs, 4);
        assert_eq!(exporter.factory().created(), 8);
    }
}
