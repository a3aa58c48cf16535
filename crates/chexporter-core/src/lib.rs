//! chexporter-core — ClickHouse metrics collection for the Prometheus exporter.
//!
//! Provides:
//! - `target` — connection parameters of the monitored ClickHouse host
//! - `collector` — metric categories, the `Fetcher` seam, the ClickHouse HTTP
//!   fetcher, mock fetchers and the `Exporter` orchestrator
//! - `metrics` — sinks, the Prometheus writer, the collector registry and
//!   text exposition encoding

pub mod collector;
pub mod metrics;
pub mod target;

pub use target::TargetDescriptor;

/// Crate version, shared by all binaries.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git SHA of the build, or `unknown`.
pub const GIT_SHA: &str = env!("GIT_SHA");

/// Build time as unix seconds.
pub const BUILT_AT: &str = env!("BUILT_AT");
