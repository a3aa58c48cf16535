use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{debug, error};

use chexporter_core::metrics::{MetricSample, TEXT_CONTENT_TYPE, encode_text};

use crate::state::AppState;

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

/// Runs one scrape and renders it in the text exposition format.
///
/// Collection runs on the blocking pool and streams into a channel drained
/// here. If the client goes away the receiver is dropped, which closes the
/// sink and stops the scrape at its next sample.
pub(crate) async fn handle_metrics(State(state): State<AppState>) -> Response {
    let (mut tx, mut rx) = mpsc::unbounded_channel::<MetricSample>();
    let registry = state.registry.clone();
    let task = tokio::task::spawn_blocking(move || registry.gather(&mut tx));

    let mut samples = Vec::new();
    while let Some(sample) = rx.recv().await {
        samples.push(sample);
    }

    if let Err(e) = task.await {
        error!(error = %e, "metrics collection task failed");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    debug!(families = samples.len(), "scrape gathered");

    match encode_text(samples) {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use chexporter_core::TargetDescriptor;
    use chexporter_core::collector::{Exporter, FetchError, MetricCategory, MockFetcherFactory};
    use chexporter_core::metrics::{FETCH_MARKER_METRIC, Registry};

    use super::*;
    use crate::build_router;

    fn state(factory: MockFetcherFactory) -> AppState {
        let target = TargetDescriptor::new("default", "", "ch-0", 8123);
        let mut registry = Registry::new();
        registry.register(Arc::new(Exporter::new(target, factory)));
        AppState::new(registry)
    }

    async fn get(state: AppState, uri: &str) -> Response {
        build_router(state, "/metrics")
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let resp = get(state(MockFetcherFactory::healthy_server()), "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
    }

    #[tokio::test]
    async fn metrics_render_healthy_scrape() {
        let resp = get(state(MockFetcherFactory::healthy_server()), "/metrics").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            TEXT_CONTENT_TYPE
        );

        let text = body_text(resp).await;
        assert!(text.contains("chi_clickhouse_table_parts_rows{"));
        assert!(text.contains("chi_clickhouse_event_SelectQuery{hostname=\"ch-0\"} 15230"));
        for category in MetricCategory::ALL {
            assert!(text.contains(&format!(
                "{}{{category=\"{}\",hostname=\"ch-0\"}} 1",
                FETCH_MARKER_METRIC,
                category.name()
            )));
        }
    }

    #[tokio::test]
    async fn metrics_report_failed_category() {
        let factory = MockFetcherFactory::failing_at(
            MetricCategory::SystemReplicas,
            FetchError::Query("HTTP 500: Code: 60. Table system.replicas does not exist".into()),
        );
        let text = body_text(get(state(factory), "/metrics").await).await;

        assert!(text.contains(&format!(
            "{}{{category=\"system.replicas\",hostname=\"ch-0\"}} 0",
            FETCH_MARKER_METRIC
        )));
        assert!(!text.contains("system.mutations"));
        assert!(!text.contains("chi_clickhouse_table_mutations"));
    }

    #[tokio::test]
    async fn unreachable_target_still_answers() {
        let resp = get(state(MockFetcherFactory::unreachable_server()), "/metrics").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let text = body_text(resp).await;
        assert!(text.contains(&format!(
            "{}{{category=\"system.metrics\",hostname=\"ch-0\"}} 0",
            FETCH_MARKER_METRIC
        )));
    }

    #[tokio::test]
    async fn metrics_are_gzip_compressed_on_request() {
        let resp = build_router(state(MockFetcherFactory::healthy_server()), "/metrics")
            .oneshot(
                Request::get("/metrics")
                    .header(header::ACCEPT_ENCODING, "gzip")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(header::CONTENT_ENCODING).unwrap(), "gzip");
    }

    #[tokio::test]
    async fn custom_metrics_path() {
        let router = build_router(state(MockFetcherFactory::healthy_server()), "/ch/metrics");
        let resp = router
            .clone()
            .oneshot(Request::get("/ch/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
