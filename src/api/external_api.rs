//! 外部签名请求 API
//!
//! 硬件钱包、二维码、注入钱包等外部执行者通过这里推进与回报流程

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    domain::external_request::{ExternalRequestSnapshot, ExternalRequestUpdate},
    error::AppError,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateExternalRequest {
    pub id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SettleExternalRequest {
    pub approved: bool,
    /// 批准时外部执行者带回的结果（例如签名）
    #[schema(value_type = Option<Object>)]
    pub value: Option<serde_json::Value>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SweepRequest {
    /// 覆盖配置的保留窗口（秒）
    pub max_age_secs: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SweepResponse {
    pub removed: usize,
    pub remaining: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettleResponse {
    pub settled: bool,
}

/// POST /api/external-requests
///
/// 登记一条外部签名流程；等待结果的句柄属于进程内调用方，
/// 这里只负责登记与查询
#[utoipa::path(
    post,
    path = "/api/external-requests",
    request_body = CreateExternalRequest,
    responses(
        (status = 200, description = "Registered", body = ExternalRequestSnapshot),
        (status = 409, description = "Duplicate id", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn create_external_request(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateExternalRequest>,
) -> Result<Json<ApiResponse<ExternalRequestSnapshot>>, AppError> {
    let _outcome = state.external_requests.create(req.id.clone())?;
    let snapshot = state
        .external_requests
        .get(&req.id)
        .ok_or_else(|| AppError::internal("entry vanished right after creation"))?;
    success_response(snapshot)
}

/// GET /api/external-requests/{id}
#[utoipa::path(
    get,
    path = "/api/external-requests/{id}",
    params(("id" = String, Path, description = "External request id")),
    responses(
        (status = 200, description = "Entry snapshot", body = ExternalRequestSnapshot),
        (status = 404, description = "Unknown id", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn get_external_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ExternalRequestSnapshot>>, AppError> {
    let snapshot = state
        .external_requests
        .get(&id)
        .ok_or_else(|| AppError::not_found(format!("no external request: {}", id)))?;
    success_response(snapshot)
}

/// PATCH /api/external-requests/{id}
///
/// 合并部分更新；id不存在是空操作而不是错误
#[utoipa::path(
    patch,
    path = "/api/external-requests/{id}",
    params(("id" = String, Path, description = "External request id")),
    request_body = ExternalRequestUpdate,
    responses((status = 200, description = "Update merged (or ignored for unknown id)"))
)]
pub async fn update_external_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<ExternalRequestUpdate>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    state.external_requests.update(&id, update);
    let found = state.external_requests.get(&id).is_some();
    success_response(serde_json::json!({ "found": found }))
}

/// POST /api/external-requests/{id}/settle
///
/// 外部执行者回报最终结果，结算能力用后即清
#[utoipa::path(
    post,
    path = "/api/external-requests/{id}/settle",
    params(("id" = String, Path, description = "External request id")),
    request_body = SettleExternalRequest,
    responses(
        (status = 200, description = "Settled", body = SettleResponse),
        (status = 404, description = "Unknown or already settled", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn settle_external_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SettleExternalRequest>,
) -> Result<Json<ApiResponse<SettleResponse>>, AppError> {
    let outcome = if req.approved {
        Ok(req.value.unwrap_or(serde_json::Value::Null))
    } else {
        Err(AppError::user_rejected(
            req.reason
                .unwrap_or_else(|| "external flow rejected".into()),
        ))
    };
    state.external_requests.settle(&id, outcome)?;
    success_response(SettleResponse { settled: true })
}

/// POST /api/external-requests/sweep
///
/// 手工触发清扫；周期清扫由生命周期子系统驱动
#[utoipa::path(
    post,
    path = "/api/external-requests/sweep",
    request_body = SweepRequest,
    responses((status = 200, description = "Sweep finished", body = SweepResponse))
)]
pub async fn sweep_external_requests(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SweepRequest>,
) -> Result<Json<ApiResponse<SweepResponse>>, AppError> {
    let max_age_secs = req
        .max_age_secs
        .unwrap_or(state.config.confirmation.external_request_max_age_secs);
    let removed = state
        .external_requests
        .sweep(Utc::now(), Duration::seconds(max_age_secs as i64));
    success_response(SweepResponse {
        removed,
        remaining: state.external_requests.len(),
    })
}
