//! Validated exporter configuration built from the command line.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use chexporter_core::TargetDescriptor;
use chexporter_core::collector::clickhouse::MAX_TIMEOUT;

use crate::Args;

/// Route answering liveness probes.
pub(crate) const HEALTH_PATH: &str = "/health";

/// Error type for configuration validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConfigError {
    /// Listen address could not be parsed or resolved.
    ListenAddr(String),
    /// Metrics path is empty or not absolute.
    MetricsPath(String),
    /// Metrics path collides with a built-in route.
    ReservedPath(String),
    EmptyHostname,
    ZeroPort,
    ZeroTimeout,
    /// Timeout in seconds above `MAX_TIMEOUT`.
    TimeoutTooLarge(u64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ListenAddr(addr) => write!(f, "invalid metrics endpoint: {}", addr),
            ConfigError::MetricsPath(path) => {
                write!(f, "metrics path must start with '/': {:?}", path)
            }
            ConfigError::ReservedPath(path) => {
                write!(f, "metrics path {} is reserved", path)
            }
            ConfigError::EmptyHostname => f.write_str("ClickHouse hostname must not be empty"),
            ConfigError::ZeroPort => f.write_str("ClickHouse port must not be 0"),
            ConfigError::ZeroTimeout => f.write_str("query timeout must be positive"),
            ConfigError::TimeoutTooLarge(secs) => write!(
                f,
                "query timeout of {}s exceeds the maximum of {}s",
                secs,
                MAX_TIMEOUT.as_secs()
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub(crate) struct ExporterConfig {
    pub(crate) listen: SocketAddr,
    pub(crate) metrics_path: String,
    pub(crate) target: TargetDescriptor,
    pub(crate) timeout: Duration,
}

impl ExporterConfig {
    pub(crate) fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let listen = parse_listen_addr(&args.metrics_endpoint)?;

        if !args.metrics_path.starts_with('/') {
            return Err(ConfigError::MetricsPath(args.metrics_path.clone()));
        }
        if args.metrics_path == HEALTH_PATH {
            return Err(ConfigError::ReservedPath(args.metrics_path.clone()));
        }
        let hostname = args.hostname.trim();
        if hostname.is_empty() {
            return Err(ConfigError::EmptyHostname);
        }
        if args.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if args.timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if args.timeout > MAX_TIMEOUT.as_secs() {
            return Err(ConfigError::TimeoutTooLarge(args.timeout));
        }

        Ok(Self {
            listen,
            metrics_path: args.metrics_path.clone(),
            target: TargetDescriptor::new(
                args.username.as_str(),
                args.password.as_str(),
                hostname,
                args.port,
            ),
            timeout: Duration::from_secs(args.timeout),
        })
    }
}

/// Parses `host:port`, or `:port` meaning all interfaces.
fn parse_listen_addr(raw: &str) -> Result<SocketAddr, ConfigError> {
    let raw = raw.trim();
    let full = match raw.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => raw.to_string(),
    };
    full.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConfigError::ListenAddr(raw.to_string()))
}
