//! HTTP API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    clash_file, get_configs, health, index, not_found, prometheus, raw_file, set_configs, status,
    subscription_file, update, AppState,
};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        // Health endpoints
        .route("/health", get(health))
        .route("/metrics", get(prometheus))
        // Subscription API
        .route("/api/update", post(update))
        .route("/api/status", get(status))
        .route("/api/configs", get(get_configs).post(set_configs))
        // Generated files
        .route("/subscription.txt", get(subscription_file))
        .route("/clash.yaml", get(clash_file))
        .route("/raw.txt", get(raw_file))
        .fallback(not_found)
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::subconverter::SubconverterClient;
    use crate::subscription::{ArtifactStore, SubscriptionService};
    use crate::testutils::{dead_converter_url, fake_sing_box, spawn_converter};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::path::Path;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state(dir: &Path, converter_url: &str, configs: &[&str], nodes: &[(&str, &str)]) -> AppState {
        let config = Config {
            sing_box_configs: configs.iter().map(|s| s.to_string()).collect(),
            static_dir: dir.join("data"),
            ..Config::default()
        };
        let service = SubscriptionService::from_parts(
            fake_sing_box(dir, nodes),
            SubconverterClient::with_base_url(converter_url, Duration::from_secs(5)),
            ArtifactStore::new(config.static_dir.clone(), config.backup_dir()),
            config.callback_url(),
        );
        AppState::with_service(&config, service)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(text) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(text.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(state(dir.path(), "http://127.0.0.1:1", &["a"], &[]));

        let response = send(&app, "GET", "/health", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(state(dir.path(), "http://127.0.0.1:1", &["a"], &[]));

        let body = body_json(send(&app, "GET", "/", None).await).await;

        assert_eq!(body["name"], "Subscription API");
        assert!(body["endpoints"]["POST /api/update"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_returns_json_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(state(dir.path(), "http://127.0.0.1:1", &["a"], &[]));

        let response = send(&app, "GET", "/nope", None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "endpoint not found", "path": "/nope" })
        );
    }

    #[tokio::test]
    async fn set_then_get_configs_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(state(dir.path(), "http://127.0.0.1:1", &["a"], &[]));

        let response = send(
            &app,
            "POST",
            "/api/configs",
            Some(r#"{"configs": ["tuic", "vmess", "hysteria2"]}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["configs"], json!(["tuic", "vmess", "hysteria2"]));

        let body = body_json(send(&app, "GET", "/api/configs", None).await).await;
        assert_eq!(body["configs"], json!(["tuic", "vmess", "hysteria2"]));
        assert!(body["description"].is_string());
    }

    #[tokio::test]
    async fn set_configs_rejects_bad_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(state(dir.path(), "http://127.0.0.1:1", &["a"], &[]));

        for body in [r#"{"names": ["x"]}"#, r#"{"configs": "x"}"#, "not json"] {
            let response = send(&app, "POST", "/api/configs", Some(body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
            assert!(body_json(response).await["error"].is_string());
        }

        let body = body_json(send(&app, "GET", "/api/configs", None).await).await;
        assert_eq!(body["configs"], json!(["a"]));
    }

    #[tokio::test]
    async fn clash_before_update_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(state(dir.path(), "http://127.0.0.1:1", &["a"], &[]));

        let response = send(&app, "GET", "/clash.yaml", None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("does not exist"));
    }

    #[tokio::test]
    async fn unreadable_artifact_is_500() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data/clash.yaml")).unwrap();
        let app = create_router(state(dir.path(), "http://127.0.0.1:1", &["a"], &[]));

        let response = send(&app, "GET", "/clash.yaml", None).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.starts_with("failed to read clash.yaml"));
    }

    #[tokio::test]
    async fn update_with_dead_converter_is_503() {
        let dir = tempfile::tempdir().unwrap();
        let converter = dead_converter_url().await;
        let app = create_router(state(dir.path(), &converter, &["b"], &[("b", "vmess://xyz")]));

        let response = send(&app, "POST", "/api/update", None).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!dir.path().join("data").exists());
    }

    #[tokio::test]
    async fn update_with_no_nodes_is_400_with_details() {
        let dir = tempfile::tempdir().unwrap();
        let stub = spawn_converter(StatusCode::OK, "proxies: []\n").await;
        let app = create_router(state(dir.path(), &stub.base_url, &["a", "b"], &[]));

        let response = send(&app, "POST", "/api/update", None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(
            body["details"],
            json!(["config a does not exist", "config b does not exist"])
        );
        assert!(!dir.path().join("data").exists());
    }

    #[tokio::test]
    async fn update_then_serve_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let stub = spawn_converter(StatusCode::OK, "proxies: []\n").await;
        let app = create_router(state(
            dir.path(),
            &stub.base_url,
            &["a", "b"],
            &[("b", "vmess://xyz")],
        ));

        let response = send(&app, "POST", "/api/update", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let summary = body_json(response).await;
        assert_eq!(summary["nodes_count"], 1);
        assert_eq!(summary["clash_generated"], true);
        assert_eq!(summary["warnings"], json!(["config a does not exist"]));

        let response = send(&app, "GET", "/raw.txt", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(response).await, "vmess://xyz");

        let response = send(&app, "GET", "/subscription.txt", None).await;
        assert_eq!(body_text(response).await, "dm1lc3M6Ly94eXo=");

        let response = send(&app, "GET", "/clash.yaml", None).await;
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/yaml; charset=utf-8"
        );
        assert_eq!(body_text(response).await, "proxies: []\n");

        let status = body_json(send(&app, "GET", "/api/status", None).await).await;
        assert_eq!(status["subscription_exists"], true);
        assert_eq!(status["nodes_count"], 1);
        assert_eq!(status["subscription_size"], 16);
    }

    #[tokio::test]
    async fn updated_config_list_drives_next_update() {
        let dir = tempfile::tempdir().unwrap();
        let stub = spawn_converter(StatusCode::OK, "proxies: []\n").await;
        let app = create_router(state(
            dir.path(),
            &stub.base_url,
            &["missing"],
            &[("tuic", "tuic://abc")],
        ));

        let response = send(&app, "POST", "/api/update", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        send(&app, "POST", "/api/configs", Some(r#"{"configs": ["tuic"]}"#)).await;
        let response = send(&app, "POST", "/api/update", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["nodes_count"], 1);
    }
}
