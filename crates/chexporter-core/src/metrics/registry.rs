//! Collector protocol and registry.

use std::sync::Arc;

use tracing::{debug, info};

use super::sink::{DiscardSink, MetricDescriptor, MetricSink};

/// Pull-based collector invoked once per scrape.
///
/// There is no static list of descriptors: `describe` runs a full collection
/// into a `DiscardSink` and reports what came out.
pub trait Collector: Send + Sync {
    /// Streams the samples of one scrape into `sink`. A closed sink is a no-op.
    fn collect(&self, sink: &mut dyn MetricSink);

    fn describe(&self) -> Vec<MetricDescriptor> {
        let mut sink = DiscardSink::new();
        self.collect(&mut sink);
        sink.into_descriptors()
    }
}

/// Explicitly constructed set of collectors scraped by the HTTP layer.
#[derive(Default)]
pub struct Registry {
    collectors: Vec<Arc<dyn Collector>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `collector` and returns the number of metrics it describes.
    ///
    /// Describing runs one full collection, so registering an exporter
    /// queries its target once.
    pub fn register(&mut self, collector: Arc<dyn Collector>) -> usize {
        let descriptors = collector.describe();
        info!(metrics = descriptors.len(), "collector registered");
        self.collectors.push(collector);
        descriptors.len()
    }

    /// Runs every registered collector, in registration order, into `sink`.
    pub fn gather(&self, sink: &mut dyn MetricSink) {
        for collector in &self.collectors {
            if !sink.is_open() {
                debug!("metric sink closed, skipping remaining collectors");
                return;
            }
            collector.collect(sink);
        }
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}
