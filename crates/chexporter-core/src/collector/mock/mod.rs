//! Mock fetchers for testing.
//!
//! This module provides `MockFetcher`, its factory, and pre-built server
//! scenarios for exercising the exporter without a running ClickHouse.

mod fetcher;
mod scenarios;

pub use fetcher::{MockFetcher, MockFetcherFactory};
