//! Prometheus side of the exporter.
//!
//! - `sink` — where samples go during a scrape (`MetricSink` and its implementations)
//! - `writer` — turns category rows and fetch markers into samples
//! - `registry` — the `Collector` protocol and the registry the HTTP layer scrapes
//! - `exposition` — text format rendering of a finished scrape

mod exposition;
mod registry;
mod sink;
mod writer;

pub use exposition::{EncodeError, TEXT_CONTENT_TYPE, encode_text, merge_families};
pub use registry::{Collector, Registry};
pub use sink::{DiscardSink, MetricDescriptor, MetricKind, MetricSample, MetricSink, SinkClosed};
pub use writer::{FETCH_MARKER_METRIC, METRIC_PREFIX, PrometheusWriter, metric_name};
