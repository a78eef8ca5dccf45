//! 健康检查与指标

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    error::AppError,
    metrics,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct Healthz {
    pub status: String,
    pub lifecycle: String,
    pub pending_confirmations: usize,
    pub version: String,
    pub timestamp: String,
}

/// GET /healthz
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "OK", body = Healthz))
)]
pub async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Healthz>>, AppError> {
    success_response(Healthz {
        status: "ok".into(),
        lifecycle: state.lifecycle.state().as_str().into(),
        pending_confirmations: state.broker.pending_count(),
        version: env!("CARGO_PKG_VERSION").into(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /metrics（Prometheus文本格式）
pub async fn metrics_text() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_prometheus(),
    )
}
