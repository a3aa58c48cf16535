//! Scripted fetcher returning canned rows or errors per category.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::collector::category::MetricCategory;
use crate::collector::rows::{CategoryRows, MutationRow, QueryMetricRow, ReplicaRow, TableSizeRow};
use crate::collector::traits::{FetchError, Fetcher, FetcherFactory};
use crate::target::TargetDescriptor;

type Script = HashMap<MetricCategory, Result<CategoryRows, FetchError>>;

/// Fetcher that answers from a fixed script.
///
/// Categories without a scripted answer fail with a connectivity error.
/// Every call is appended to a log shared with the factory that built it.
#[derive(Debug, Clone)]
pub struct MockFetcher {
    script: Script,
    calls: Arc<Mutex<Vec<MetricCategory>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            script: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Scripts a successful answer.
    pub fn with_rows(mut self, rows: CategoryRows) -> Self {
        self.script.insert(rows.category(), Ok(rows));
        self
    }

    /// Scripts a failure for `category`.
    pub fn with_error(mut self, category: MetricCategory, error: FetchError) -> Self {
        self.script.insert(category, Err(error));
        self
    }

    /// Categories queried so far, in call order.
    pub fn calls(&self) -> Vec<MetricCategory> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn answer(&mut self, category: MetricCategory) -> Result<CategoryRows, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(category);
        }
        self.script.get(&category).cloned().unwrap_or_else(|| {
            Err(FetchError::Connectivity(format!(
                "no scripted answer for {}",
                category
            )))
        })
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn mismatch(category: MetricCategory, rows: CategoryRows) -> FetchError {
    FetchError::Query(format!(
        "scripted {} rows for {}",
        rows.category(),
        category
    ))
}

impl Fetcher for MockFetcher {
    fn query_metrics(&mut self) -> Result<Vec<QueryMetricRow>, FetchError> {
        match self.answer(MetricCategory::QueryMetrics)? {
            CategoryRows::QueryMetrics(rows) => Ok(rows),
            other => Err(mismatch(MetricCategory::QueryMetrics, other)),
        }
    }

    fn table_sizes(&mut self) -> Result<Vec<TableSizeRow>, FetchError> {
        match self.answer(MetricCategory::TableSizes)? {
            CategoryRows::TableSizes(rows) => Ok(rows),
            other => Err(mismatch(MetricCategory::TableSizes, other)),
        }
    }

    fn system_replicas(&mut self) -> Result<Vec<ReplicaRow>, FetchError> {
        match self.answer(MetricCategory::SystemReplicas)? {
            CategoryRows::SystemReplicas(rows) => Ok(rows),
            other => Err(mismatch(MetricCategory::SystemReplicas, other)),
        }
    }

    fn mutations(&mut self) -> Result<Vec<MutationRow>, FetchError> {
        match self.answer(MetricCategory::Mutations)? {
            CategoryRows::Mutations(rows) => Ok(rows),
            other => Err(mismatch(MetricCategory::Mutations, other)),
        }
    }
}

/// Hands out clones of scripted fetchers.
///
/// With more than one script the factory rotates through them, one per
/// `new_fetcher` call, which lets tests give overlapping scrapes different
/// server states.
#[derive(Debug)]
pub struct MockFetcherFactory {
    scripts: Vec<MockFetcher>,
    created: AtomicUsize,
    calls: Arc<Mutex<Vec<MetricCategory>>>,
    fail_construction: Option<FetchError>,
}

impl MockFetcherFactory {
    pub fn new(fetcher: MockFetcher) -> Self {
        Self::rotating(vec![fetcher])
    }

    /// Rotates through `scripts`, starting with the first.
    pub fn rotating(scripts: Vec<MockFetcher>) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let scripts = scripts
            .into_iter()
            .map(|mut f| {
                f.calls = calls.clone();
                f
            })
            .collect();
        Self {
            scripts,
            created: AtomicUsize::new(0),
            calls,
            fail_construction: None,
        }
    }

    /// Makes every `new_fetcher` call fail with `error`.
    pub fn failing_construction(error: FetchError) -> Self {
        let mut factory = Self::new(MockFetcher::new());
        factory.fail_construction = Some(error);
        factory
    }

    /// Number of fetchers handed out so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Categories queried by all fetchers from this factory, in call order.
    pub fn calls(&self) -> Vec<MetricCategory> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl FetcherFactory for MockFetcherFactory {
    type Fetcher = MockFetcher;

    fn new_fetcher(&self, _target: &TargetDescriptor) -> Result<MockFetcher, FetchError> {
        if let Some(ref err) = self.fail_construction {
            return Err(err.clone());
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        match self.scripts.get(n % self.scripts.len().max(1)) {
            Some(fetcher) => Ok(fetcher.clone()),
            None => Ok(MockFetcher {
                script: HashMap::new(),
                calls: self.calls.clone(),
            }),
        }
    }
}
