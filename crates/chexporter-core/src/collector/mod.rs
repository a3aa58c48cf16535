//! ClickHouse metrics collection.
//!
//! Every scrape walks a fixed list of metric categories against one ClickHouse
//! host, turning each row set into Prometheus samples and recording a
//! success/failure marker per category.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Exporter                            │
//! │   TargetDescriptor (immutable)     FetcherFactory            │
//! │                                         │ new_fetcher()      │
//! │   per scrape:                    ┌──────▼──────┐             │
//! │   ┌──────────────────────┐       │   Fetcher   │ (trait)     │
//! │   │ for category in ALL: │──────►└──────┬──────┘             │
//! │   │   fetch → write      │              │                    │
//! │   │   marker(ok | fail)  │       ┌──────┴───────────────┐    │
//! │   └──────────┬───────────┘       │                      │    │
//! │              │            ┌──────▼──────────┐  ┌────────▼──┐ │
//! │   ┌──────────▼────────┐   │ClickHouseFetcher│  │MockFetcher│ │
//! │   │ PrometheusWriter  │   │  (HTTP, 8123)   │  │ (Testing) │ │
//! │   └──────────┬────────┘   └─────────────────┘  └───────────┘ │
//! └──────────────┼───────────────────────────────────────────────┘
//!                ▼
//!           MetricSink (Vec, channel, discard)
//! ```
//!
//! # Usage
//!
//! ```
//! use chexporter_core::TargetDescriptor;
//! use chexporter_core::collector::{Exporter, MockFetcherFactory};
//! use chexporter_core::metrics::{Collector, MetricSample};
//!
//! let target = TargetDescriptor::new("default", "", "localhost", 8123);
//! let exporter = Exporter::new(target, MockFetcherFactory::healthy_server());
//!
//! let mut samples: Vec<MetricSample> = Vec::new();
//! exporter.collect(&mut samples);
//! assert!(!samples.is_empty());
//! ```

mod category;
pub mod clickhouse;
mod exporter;
pub mod mock;
mod rows;
mod traits;

pub use category::MetricCategory;
pub use clickhouse::{ClickHouseFetcher, HttpFetcherFactory};
pub use exporter::{CategoryStatus, Exporter, ScrapeReport};
pub use mock::{MockFetcher, MockFetcherFactory};
pub use rows::{CategoryRows, MutationRow, QueryMetricRow, ReplicaRow, SampleKind, TableSizeRow};
pub use traits::{FetchError, Fetcher, FetcherFactory};
