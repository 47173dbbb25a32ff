//! HTTP request handlers and the router.

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use utoipa::{OpenApi, ToSchema};

use mharvest_core::config::ServerConfig;
use mharvest_core::registry::Format;

use crate::access_log::AccessLogLayer;
use crate::openapi::ApiDoc;
use crate::state::AppState;

const SERVICE_NAME: &str = "metric_harvester";

// ============================================================
// Router
// ============================================================

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/api-docs/openapi.json", get(handle_openapi))
        .with_state(state)
}

/// The router with access log, request timeout and gzip applied.
/// A request gets `read_timeout + write_timeout` end to end.
pub(crate) fn app(state: AppState, server: &ServerConfig) -> Router {
    router(state)
        .layer(AccessLogLayer)
        .layer(TimeoutLayer::new(server.read_timeout + server.write_timeout))
        .layer(CompressionLayer::new())
}

// ============================================================
// Metrics
// ============================================================

#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Latest value of every series in the Prometheus text format, or OpenMetrics when requested via Accept", body = String, content_type = "text/plain")
    )
)]
pub(crate) async fn handle_metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());
    let format = Format::negotiate(accept);
    let body = state.registry.render(format);
    ([(header::CONTENT_TYPE, format.content_type())], body).into_response()
}

// ============================================================
// Health
// ============================================================

#[derive(Serialize, ToSchema)]
pub(crate) struct HealthResponse {
    status: String,
    /// RFC 3339, UTC.
    timestamp: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub(crate) async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

// ============================================================
// Info
// ============================================================

#[derive(Serialize, ToSchema)]
pub(crate) struct InfoResponse {
    service: String,
    version: String,
    /// Number of enabled collectors.
    collectors: usize,
    collector_names: Vec<String>,
    docker_enabled: bool,
    podman_enabled: bool,
    collection_interval: String,
    platform: String,
    cycles_completed: u64,
    ticks_skipped: u64,
    /// End of the most recent cycle, RFC 3339. Absent before the first one.
    #[serde(skip_serializing_if = "Option::is_none")]
    last_cycle_at: Option<String>,
}

#[utoipa::path(
    get,
    path = "/info",
    responses(
        (status = 200, description = "Service configuration and harvest progress", body = InfoResponse)
    )
)]
pub(crate) async fn handle_info(State(state): State<AppState>) -> Json<InfoResponse> {
    let info = &state.info;
    let summary = state.stats.summary();
    Json(InfoResponse {
        service: SERVICE_NAME.to_string(),
        version: mharvest_core::VERSION.to_string(),
        collectors: info.collectors.len(),
        collector_names: info.collectors.clone(),
        docker_enabled: info.docker_enabled,
        podman_enabled: info.podman_enabled,
        collection_interval: info.collection_interval.clone(),
        platform: info.platform.to_string(),
        cycles_completed: summary.cycles_completed,
        ticks_skipped: summary.ticks_skipped,
        last_cycle_at: summary
            .last_cycle_at
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    })
}

// ============================================================
// OpenAPI
// ============================================================

pub(crate) async fn handle_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use mharvest_core::config::Config;
    use mharvest_core::executor::MockExecutor;
    use mharvest_core::pipeline;
    use mharvest_core::probe::Platform;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    async fn harvested_state() -> AppState {
        let config = Config::default();
        let pipeline = pipeline::build(
            &config,
            Arc::new(MockExecutor::typical_linux()),
            Platform::Linux,
        )
        .unwrap();
        pipeline.scheduler.run_cycle().await;
        AppState::new(&config, &pipeline)
    }

    async fn send(app: Router, uri: &str, headers: &[(&str, &str)]) -> Response {
        let mut req = Request::builder().uri(uri);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_default_format() {
        let resp = send(router(harvested_state().await), "/metrics", &[]).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4; charset=utf-8"
        );
        let text = body_text(resp).await;
        assert!(text.contains("# TYPE system_cpu_usage_percent gauge\n"));
        assert!(text.contains("container_running{container=\"db\",runtime=\"docker\"} 1\n"));
        assert!(!text.contains("# EOF"));
    }

    #[tokio::test]
    async fn test_metrics_openmetrics_negotiation() {
        let resp = send(
            router(harvested_state().await),
            "/metrics",
            &[("accept", "application/openmetrics-text; version=1.0.0,text/plain;q=0.5")],
        )
        .await;

        assert!(
            resp.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("application/openmetrics-text")
        );
        assert!(body_text(resp).await.ends_with("# EOF\n"));
    }

    #[tokio::test]
    async fn test_metrics_are_gzipped_on_request() {
        let state = harvested_state().await;
        let resp = send(
            app(state, &ServerConfig::default()),
            "/metrics",
            &[("accept-encoding", "gzip")],
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_ENCODING], "gzip");
    }

    #[tokio::test]
    async fn test_health() {
        let resp = send(router(harvested_state().await), "/health", &[]).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["status"], "healthy");
        let timestamp = json["timestamp"].as_str().unwrap();
        assert!(timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_info() {
        let resp = send(router(harvested_state().await), "/info", &[]).await;
        let json: Value = serde_json::from_str(&body_text(resp).await).unwrap();

        assert_eq!(json["service"], "metric_harvester");
        assert_eq!(json["collectors"], 3);
        assert_eq!(json["collector_names"][1], "container");
        assert_eq!(json["docker_enabled"], true);
        assert_eq!(json["collection_interval"], "15s");
        assert_eq!(json["platform"], "linux");
        assert_eq!(json["cycles_completed"], 1);
        assert_eq!(json["ticks_skipped"], 0);
        assert!(json["last_cycle_at"].is_string());
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let resp = send(router(harvested_state().await), "/api-docs/openapi.json", &[]).await;
        let json: Value = serde_json::from_str(&body_text(resp).await).unwrap();

        assert!(json["paths"]["/info"].is_object());
        assert!(json["paths"]["/health"].is_object());
        assert!(json["components"]["schemas"]["InfoResponse"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let resp = send(router(harvested_state().await), "/nope", &[]).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
