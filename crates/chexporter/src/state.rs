//! Shared application state.

use std::sync::Arc;

use chexporter_core::metrics::Registry;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<Registry>,
}

impl AppState {
    pub(crate) fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}
