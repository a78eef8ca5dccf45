//! 生命周期 API
//!
//! 弹窗、闹钟、内容脚本等多个入口都可能触发休眠/唤醒，
//! 并发触发由控制器合流，这里只做转发

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    error::AppError,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct WakeupRequest {
    /// true 时继续执行完整唤醒阶段
    #[serde(default = "default_full")]
    pub full: bool,
}

fn default_full() -> bool {
    true
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LifecycleStateResponse {
    pub state: String,
    pub active: bool,
}

/// GET /api/lifecycle/state
#[utoipa::path(
    get,
    path = "/api/lifecycle/state",
    responses((status = 200, description = "Current lifecycle state", body = LifecycleStateResponse))
)]
pub async fn lifecycle_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<LifecycleStateResponse>>, AppError> {
    let current = state.lifecycle.state();
    success_response(LifecycleStateResponse {
        state: current.as_str().to_string(),
        active: current.is_active(),
    })
}

/// POST /api/lifecycle/sleep
#[utoipa::path(
    post,
    path = "/api/lifecycle/sleep",
    responses((status = 200, description = "Stopped", body = LifecycleStateResponse))
)]
pub async fn sleep(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<LifecycleStateResponse>>, AppError> {
    state.lifecycle.sleep().await;
    let current = state.lifecycle.state();
    success_response(LifecycleStateResponse {
        state: current.as_str().to_string(),
        active: current.is_active(),
    })
}

/// POST /api/lifecycle/wakeup
#[utoipa::path(
    post,
    path = "/api/lifecycle/wakeup",
    request_body = WakeupRequest,
    responses((status = 200, description = "Started", body = LifecycleStateResponse))
)]
pub async fn wakeup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WakeupRequest>,
) -> Result<Json<ApiResponse<LifecycleStateResponse>>, AppError> {
    state.lifecycle.wakeup(req.full).await;
    let current = state.lifecycle.state();
    success_response(LifecycleStateResponse {
        state: current.as_str().to_string(),
        active: current.is_active(),
    })
}
