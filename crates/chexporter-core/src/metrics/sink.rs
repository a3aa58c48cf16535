//! Output sinks for metric samples.

use std::collections::BTreeSet;

use prometheus::proto::{MetricFamily, MetricType};
use tokio::sync::mpsc::UnboundedSender;

/// One unit of scrape output.
///
/// The exporter only counts and forwards samples; their content is owned by
/// the writer that built them.
pub type MetricSample = MetricFamily;

/// The sink was closed before the sample could be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

impl std::fmt::Display for SinkClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("metric sink is closed")
    }
}

impl std::error::Error for SinkClosed {}

/// Destination of the samples produced during one scrape.
pub trait MetricSink {
    /// Whether samples can still be delivered.
    fn is_open(&self) -> bool;

    fn emit(&mut self, sample: MetricSample) -> Result<(), SinkClosed>;
}

impl MetricSink for Vec<MetricSample> {
    fn is_open(&self) -> bool {
        true
    }

    fn emit(&mut self, sample: MetricSample) -> Result<(), SinkClosed> {
        self.push(sample);
        Ok(())
    }
}

/// Channel sink used by the HTTP layer; closed once the receiver is dropped.
impl MetricSink for UnboundedSender<MetricSample> {
    fn is_open(&self) -> bool {
        !self.is_closed()
    }

    fn emit(&mut self, sample: MetricSample) -> Result<(), SinkClosed> {
        self.send(sample).map_err(|_| SinkClosed)
    }
}

/// Prometheus metric type, as seen in descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
    Summary,
    Histogram,
    Untyped,
}

impl From<MetricType> for MetricKind {
    fn from(t: MetricType) -> Self {
        match t {
            MetricType::COUNTER => MetricKind::Counter,
            MetricType::GAUGE => MetricKind::Gauge,
            MetricType::SUMMARY => MetricKind::Summary,
            MetricType::HISTOGRAM => MetricKind::Histogram,
            _ => MetricKind::Untyped,
        }
    }
}

/// Name, help, type and label names of a metric, without values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    /// Sorted label names.
    pub label_names: Vec<String>,
}

impl MetricDescriptor {
    pub fn from_sample(sample: &MetricSample) -> Self {
        let mut label_names: Vec<String> = sample
            .get_metric()
            .first()
            .map(|m| {
                m.get_label()
                    .iter()
                    .map(|l| l.get_name().to_string())
                    .collect()
            })
            .unwrap_or_default();
        label_names.sort();

        Self {
            name: sample.get_name().to_string(),
            help: sample.get_help().to_string(),
            kind: sample.get_field_type().into(),
            label_names,
        }
    }
}

/// Sink that drops sample values and keeps the distinct descriptors.
///
/// Backs `Collector::describe`.
#[derive(Debug, Default)]
pub struct DiscardSink {
    descriptors: BTreeSet<MetricDescriptor>,
}

impl DiscardSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_descriptors(self) -> Vec<MetricDescriptor> {
        self.descriptors.into_iter().collect()
    }
}

impl MetricSink for DiscardSink {
    fn is_open(&self) -> bool {
        true
    }

    fn emit(&mut self, sample: MetricSample) -> Result<(), SinkClosed> {
        self.descriptors.insert(MetricDescriptor::from_sample(&sample));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector as _;
    use prometheus::{GaugeVec, Opts};
    use tokio::sync::mpsc;

    fn sample(name: &str) -> MetricSample {
        let vec = GaugeVec::new(Opts::new(name, "test gauge"), &["table", "database"]).unwrap();
        vec.with_label_values(&["events", "default"]).set(1.0);
        vec.collect().remove(0)
    }

    #[test]
    fn descriptor_sorts_label_names() {
        let d = MetricDescriptor::from_sample(&sample("test_gauge"));
        assert_eq!(d.name, "test_gauge");
        assert_eq!(d.kind, MetricKind::Gauge);
        assert_eq!(d.label_names, vec!["database".to_string(), "table".to_string()]);
    }

    #[test]
    fn discard_sink_deduplicates() {
        let mut sink = DiscardSink::new();
        sink.emit(sample("a")).unwrap();
        sink.emit(sample("a")).unwrap();
        sink.emit(sample("b")).unwrap();
        let names: Vec<String> = sink.into_descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn channel_sink_closes_with_receiver() {
        let (mut tx, rx) = mpsc::unbounded_channel::<MetricSample>();
        assert!(tx.is_open());
        tx.emit(sample("a")).unwrap();
        drop(rx);
        assert!(!tx.is_open());
        assert_eq!(tx.emit(sample("a")), Err(SinkClosed));
    }
}
