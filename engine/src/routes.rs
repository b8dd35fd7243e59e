use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    engine::PredictionEngine,
    error::AppError,
    types::{ModelInfo, PredictRequest, PredictResponse, QuestionView},
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PredictionEngine>,
    /// Absent when no Prometheus recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(engine: PredictionEngine, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            engine: Arc::new(engine),
            metrics,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/models", get(models))
        .route("/questionnaire", get(questionnaire))
        .route("/metrics", get(metrics))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, AppError> {
    info!("Received prediction request for model: {}", request.model);

    // artifact reads are blocking file I/O
    let engine = Arc::clone(&state.engine);
    let response = tokio::task::spawn_blocking(move || engine.predict(&request))
        .await
        .map_err(|e| AppError::Internal(format!("prediction task failed: {}", e)))??;

    Ok(Json(response))
}

pub async fn models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    Json(state.engine.models())
}

pub async fn questionnaire(State(state): State<AppState>) -> Json<Vec<QuestionView>> {
    Json(state.engine.questionnaire())
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

pub async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "mhp-engine",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
