mod config;
mod handlers;
mod shutdown;
mod state;

use std::process;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use chexporter_core::collector::clickhouse::DEFAULT_TIMEOUT;
use chexporter_core::collector::{Exporter, HttpFetcherFactory};
use chexporter_core::metrics::Registry;

use config::ExporterConfig;
use state::AppState;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(
    name = "chexporter",
    about = "Prometheus exporter for ClickHouse server metrics",
    version = chexporter_core::VERSION
)]
pub(crate) struct Args {
    /// Address to expose metrics on. `:PORT` listens on all interfaces.
    #[arg(long, default_value = ":8888", env = "CH_EXPORTER_METRICS_ENDPOINT")]
    pub(crate) metrics_endpoint: String,

    /// HTTP path serving the metrics.
    #[arg(long, default_value = "/metrics", env = "CH_EXPORTER_METRICS_PATH")]
    pub(crate) metrics_path: String,

    /// ClickHouse host to scrape.
    #[arg(long, default_value = "localhost", env = "CH_EXPORTER_HOSTNAME")]
    pub(crate) hostname: String,

    /// ClickHouse HTTP interface port.
    #[arg(long, default_value_t = 8123, env = "CH_EXPORTER_PORT")]
    pub(crate) port: u16,

    /// ClickHouse user. Empty means no authentication.
    #[arg(long, default_value = "", env = "CH_EXPORTER_USERNAME")]
    pub(crate) username: String,

    /// ClickHouse password.
    #[arg(
        long,
        default_value = "",
        env = "CH_EXPORTER_PASSWORD",
        hide_env_values = true
    )]
    pub(crate) password: String,

    /// Per-query timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs(), env = "CH_EXPORTER_TIMEOUT")]
    pub(crate) timeout: u64,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let config = match ExporterConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            process::exit(1);
        }
    };

    info!(
        version = chexporter_core::VERSION,
        git_sha = chexporter_core::GIT_SHA,
        built_at = chexporter_core::BUILT_AT,
        "starting ClickHouse exporter"
    );

    let factory = HttpFetcherFactory::new(config.timeout);
    info!(
        clickhouse = ?config.target,
        timeout_secs = factory.timeout().as_secs(),
        "scrape target"
    );

    // Registration describes the exporter with one blocking scrape, so it
    // has to run before the async runtime takes over this thread.
    let exporter = Exporter::new(config.target.clone(), factory);
    let mut registry = Registry::new();
    registry.register(Arc::new(exporter));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(async_main(config, AppState::new(registry))) {
        error!(error = %e, "server error");
        process::exit(1);
    }
    info!("exporter stopped");
}

async fn async_main(config: ExporterConfig, state: AppState) -> std::io::Result<()> {
    let app = build_router(state, &config.metrics_path);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    info!(addr = %config.listen, path = %config.metrics_path, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal())
        .await
}

pub(crate) fn build_router(state: AppState, metrics_path: &str) -> Router {
    Router::new()
        .route(metrics_path, get(handlers::handle_metrics))
        .route(config::HEALTH_PATH, get(handlers::handle_health))
        .with_state(state)
        .layer(CompressionLayer::new())
}

/// `RUST_LOG`, when set, wins over `-v`/`-q`.
fn init_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(log_level(verbose, quiet)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

fn default_filter(level: Level) -> EnvFilter {
    EnvFilter::new(format!("chexporter={level},chexporter_core={level}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_flags_pick_level() {
        assert_eq!(log_level(0, false), Level::INFO);
        assert_eq!(log_level(1, false), Level::DEBUG);
        assert_eq!(log_level(3, false), Level::TRACE);
        assert_eq!(log_level(2, true), Level::ERROR);
    }

    #[test]
    fn default_filter_covers_both_crates() {
        let filter = default_filter(Level::DEBUG).to_string().to_lowercase();
        assert!(filter.contains("chexporter=debug"), "{}", filter);
        assert!(filter.contains("chexporter_core=debug"), "{}", filter);
    }
}
