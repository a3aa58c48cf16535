//! Signal handling for graceful shutdown.

use std::process;

use tracing::{error, info, warn};

/// Resolves on the first SIGINT or SIGTERM.
///
/// After that a watcher stays armed: a second signal exits the process with
/// status 1 without waiting for in-flight scrapes.
pub(crate) async fn signal() {
    wait_for_signal().await;
    info!("shutdown signal received, draining connections");

    tokio::spawn(async {
        wait_for_signal().await;
        warn!("second shutdown signal received, exiting");
        process::exit(1);
    });
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
