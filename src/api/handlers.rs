//! HTTP API handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::Config;
use crate::error::ApiError;
use crate::metrics;
use crate::subscription::{Artifact, StatusReport, SubscriptionService, UpdateSummary};

/// Routes listed by the index handler.
pub const ENDPOINTS: &[(&str, &str)] = &[
    ("GET /", "API documentation"),
    ("GET /health", "liveness check"),
    ("GET /metrics", "Prometheus metrics"),
    ("POST /api/update", "update the subscription"),
    ("GET /api/status", "artifact and dependency status"),
    ("GET /api/configs", "list configured sing-box configs"),
    ("POST /api/configs", "replace the config list"),
    ("GET /subscription.txt", "base64 subscription"),
    ("GET /clash.yaml", "Clash config"),
    ("GET /raw.txt", "raw node links"),
];

const CONFIGS_DESCRIPTION: &str = "sing-box config names used by the next update";

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Config names for the next update. Replaced wholesale by `POST /api/configs`.
    pub configs: Arc<RwLock<Vec<String>>>,
    /// Update/status service.
    pub service: SubscriptionService,
}

impl AppState {
    /// Create new app state from config.
    pub fn new(config: &Config) -> Self {
        Self::with_service(config, SubscriptionService::new(config))
    }

    /// Create app state around an existing service.
    pub fn with_service(config: &Config, service: SubscriptionService) -> Self {
        Self {
            configs: Arc::new(RwLock::new(config.sing_box_configs.clone())),
            service,
        }
    }

    /// Snapshot of the current config list.
    pub async fn config_names(&self) -> Vec<String> {
        self.configs.read().await.clone()
    }
}

/// `GET /api/configs` response.
#[derive(Debug, Serialize)]
pub struct ConfigsResponse {
    /// Current config names.
    pub configs: Vec<String>,
    /// What the list is for.
    pub description: &'static str,
}

/// `POST /api/configs` body.
#[derive(Debug, Deserialize)]
pub struct SetConfigsRequest {
    /// Replacement config names.
    pub configs: Vec<String>,
}

/// `POST /api/configs` response.
#[derive(Debug, Serialize)]
pub struct SetConfigsResponse {
    pub success: bool,
    pub message: &'static str,
    pub configs: Vec<String>,
}

/// Index handler - lists every endpoint.
pub async fn index() -> impl IntoResponse {
    let endpoints: Map<String, Value> = ENDPOINTS
        .iter()
        .map(|(route, purpose)| (route.to_string(), Value::from(*purpose)))
        .collect();

    Json(json!({
        "name": "Subscription API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "endpoints": endpoints,
    }))
}

/// Health check handler - always returns 200.
pub async fn health() -> &'static str {
    "OK"
}

/// Prometheus scrape handler.
pub async fn prometheus() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

/// Update handler - runs one full update cycle.
pub async fn update(State(state): State<AppState>) -> Result<Json<UpdateSummary>, ApiError> {
    let names = state.config_names().await;
    let summary = state.service.update(&names).await?;
    Ok(Json(summary))
}

/// Status handler - read-only inspection of artifacts and dependencies.
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusReport>, ApiError> {
    state.service.status().await.map(Json).map_err(|e| {
        error!(error = %e, "status check failed");
        ApiError::Internal(e.to_string())
    })
}

/// List configured names.
pub async fn get_configs(State(state): State<AppState>) -> Json<ConfigsResponse> {
    Json(ConfigsResponse {
        configs: state.config_names().await,
        description: CONFIGS_DESCRIPTION,
    })
}

/// Replace the configured names.
pub async fn set_configs(
    State(state): State<AppState>,
    body: Result<Json<SetConfigsRequest>, JsonRejection>,
) -> Result<Json<SetConfigsResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        ApiError::BadRequest(format!(
            "request body must be {{\"configs\": [..]}}: {}",
            rejection.body_text()
        ))
    })?;

    let mut configs = state.configs.write().await;
    *configs = request.configs;
    info!(configs = ?configs.as_slice(), "config list updated");

    Ok(Json(SetConfigsResponse {
        success: true,
        message: "config list updated",
        configs: configs.clone(),
    }))
}

async fn serve_artifact(state: &AppState, artifact: Artifact) -> Result<Response, ApiError> {
    match state.service.store().read(artifact).await {
        Ok(Some(bytes)) => {
            Ok(([(header::CONTENT_TYPE, artifact.content_type())], bytes).into_response())
        }
        Ok(None) => Err(ApiError::NotFound(artifact.missing_message().to_string())),
        Err(e) => {
            error!(%artifact, error = %e, "failed to read artifact");
            Err(ApiError::ReadFailed(format!(
                "failed to read {}: {}",
                artifact.file_name(),
                e
            )))
        }
    }
}

/// Serve the base64 subscription.
pub async fn subscription_file(State(state): State<AppState>) -> Result<Response, ApiError> {
    serve_artifact(&state, Artifact::Subscription).await
}

/// Serve the Clash config.
pub async fn clash_file(State(state): State<AppState>) -> Result<Response, ApiError> {
    serve_artifact(&state, Artifact::Clash).await
}

/// Serve the raw node links.
pub async fn raw_file(State(state): State<AppState>) -> Result<Response, ApiError> {
    serve_artifact(&state, Artifact::Raw).await
}

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "endpoint not found", "path": uri.path() })),
    )
}
