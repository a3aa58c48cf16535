//! ClickHouse fetcher over the HTTP interface.
//!
//! Each category query is POSTed to `http://{hostname}:{port}/` and answered in
//! `JSONEachRow` format, one JSON object per line. Credentials go in HTTP basic
//! auth when a username is configured; otherwise the server's `default` user
//! applies.
//!
//! The blocking client is created together with the fetcher, so it lives for
//! exactly one scrape and must be used off the async runtime.

mod queries;

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::category::MetricCategory;
use super::rows::{MutationRow, QueryMetricRow, ReplicaRow, TableSizeRow};
use super::traits::{FetchError, Fetcher, FetcherFactory};
use crate::target::TargetDescriptor;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest per-request timeout accepted. Larger values are clamped, since
/// the HTTP client adds the timeout to the current instant.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

/// ClickHouse error codes that mean the credentials were rejected.
const AUTH_ERROR_CODES: [&str; 2] = ["Code: 516", "Code: 192"];

/// Fetcher for one ClickHouse host.
pub struct ClickHouseFetcher {
    client: Client,
    url: String,
    username: String,
    password: String,
}

impl ClickHouseFetcher {
    /// Creates a fetcher bound to `target` with a per-request `timeout`,
    /// clamped to `MAX_TIMEOUT`.
    pub fn new(target: &TargetDescriptor, timeout: Duration) -> Result<Self, FetchError> {
        let timeout = timeout.min(MAX_TIMEOUT);
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| FetchError::Connectivity(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: endpoint_url(target.hostname(), target.port()),
            username: target.username().to_string(),
            password: target.password().to_string(),
        })
    }

    fn run_query<T: DeserializeOwned>(&self, category: MetricCategory) -> Result<Vec<T>, FetchError> {
        let query = queries::build_category_query(category);

        let mut request = self.client.post(&self.url).body(query);
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }

        let response = request.send().map_err(|e| format_transport_error(&e))?;
        let status = response.status();
        let body = response.text().map_err(|e| format_transport_error(&e))?;

        if !status.is_success() {
            return Err(format_clickhouse_error(status, &body));
        }

        let rows = parse_rows(&body)?;
        debug!(category = %category, rows = rows.len(), "query finished");
        Ok(rows)
    }
}

impl Fetcher for ClickHouseFetcher {
    fn query_metrics(&mut self) -> Result<Vec<QueryMetricRow>, FetchError> {
        self.run_query(MetricCategory::QueryMetrics)
    }

    fn table_sizes(&mut self) -> Result<Vec<TableSizeRow>, FetchError> {
        self.run_query(MetricCategory::TableSizes)
    }

    fn system_replicas(&mut self) -> Result<Vec<ReplicaRow>, FetchError> {
        self.run_query(MetricCategory::SystemReplicas)
    }

    fn mutations(&mut self) -> Result<Vec<MutationRow>, FetchError> {
        self.run_query(MetricCategory::Mutations)
    }
}

/// Creates a `ClickHouseFetcher` per scrape.
#[derive(Debug, Clone, Copy)]
pub struct HttpFetcherFactory {
    timeout: Duration,
}

impl HttpFetcherFactory {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: timeout.min(MAX_TIMEOUT),
        }
    }

    /// Effective per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl FetcherFactory for HttpFetcherFactory {
    type Fetcher = ClickHouseFetcher;

    fn new_fetcher(&self, target: &TargetDescriptor) -> Result<ClickHouseFetcher, FetchError> {
        ClickHouseFetcher::new(target, self.timeout)
    }
}

/// Builds the HTTP endpoint, bracketing IPv6 literals.
fn endpoint_url(hostname: &str, port: u16) -> String {
    let host = if hostname.contains(':') && !hostname.starts_with('[') {
        format!("[{}]", hostname)
    } else {
        hostname.to_string()
    };
    format!(
        "http://{}:{}/?output_format_json_quote_64bit_integers=0",
        host, port
    )
}

/// Decodes a `JSONEachRow` body. Blank lines are ignored.
fn parse_rows<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, FetchError> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| FetchError::Query(format!("malformed row {}: {}", i + 1, e)))
        })
        .collect()
}

/// Classifies transport-level failures. All of them mean the host could not be reached.
fn format_transport_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Connectivity("request timed out".to_string())
    } else if e.is_connect() {
        FetchError::Connectivity("connection refused".to_string())
    } else {
        FetchError::Connectivity(e.to_string())
    }
}

/// Classifies an error response from the server.
fn format_clickhouse_error(status: StatusCode, body: &str) -> FetchError {
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || AUTH_ERROR_CODES.iter().any(|code| body.contains(code))
    {
        return FetchError::Connectivity("authentication failed".to_string());
    }

    let message = body.lines().next().unwrap_or("").trim();
    if message.is_empty() {
        FetchError::Query(format!("HTTP {}", status.as_u16()))
    } else {
        FetchError::Query(format!("HTTP {}: {}", status.as_u16(), message))
    }
}
