//! 确认队列 API
//!
//! dApp侧RPC入口：请求先过验证管线，再入确认队列挂起等待；
//! UI侧通过 complete/cancel 结算，通过快照接口渲染队列

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    domain::confirmation::{
        ConfirmationFamily, ConfirmationOptions, ConfirmationPayload, ConfirmationResult,
        SendTransactionPayload, SignMessagePayload,
    },
    domain::validation::PayloadValidated,
    error::AppError,
    service::confirmation_broker::ResultValidator,
    service::validation_pipeline::{self, validate},
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 请求/响应模型
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignMessageRequest {
    /// 未提供时自动生成
    pub id: Option<String>,
    /// 发起方来源
    pub url: String,
    pub family: ConfirmationFamily,
    pub payload: SignMessagePayload,
    /// 批准时是否必须携带密码
    #[serde(default)]
    pub requires_password: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignMessageResponse {
    pub id: String,
    pub signature: Option<String>,
    pub approved: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransactionRequest {
    pub id: Option<String>,
    pub url: String,
    pub family: ConfirmationFamily,
    pub payload: SendTransactionPayload,
    #[serde(default)]
    pub requires_password: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub id: String,
    pub signature: Option<String>,
    pub approved: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompleteRequest {
    /// {家族 -> 结果}
    #[schema(value_type = Object)]
    pub results: HashMap<ConfirmationFamily, ConfirmationResult>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompleteResponse {
    pub settled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponse {
    pub cancelled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PendingCountResponse {
    pub count: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// API Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POST /api/requests/sign-message
///
/// 签名消息：验证管线 -> 入队 -> 挂起直到用户批准/拒绝
#[utoipa::path(
    post,
    path = "/api/requests/sign-message",
    request_body = SignMessageRequest,
    responses(
        (status = 200, description = "Approved", body = SignMessageResponse),
        (status = 400, description = "Validation failed", body = crate::error_body::ErrorBodyDoc),
        (status = 403, description = "Rejected by user", body = crate::error_body::ErrorBodyDoc),
        (status = 409, description = "Duplicate request", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn request_sign_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignMessageRequest>,
) -> Result<Json<ApiResponse<SignMessageResponse>>, AppError> {
    let id = req.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let payload = req.payload.clone();

    let envelope = PayloadValidated::new(req.family, payload.clone())
        .with_address(payload.address.clone())
        .with_network(payload.network_key.clone());
    let validated = validate(
        &state.validation,
        &req.url,
        envelope,
        &validation_pipeline::sign_message_steps(),
        None,
    )
    .await;

    if !validated.is_clean() {
        return Err(reject_or_acknowledge(&state, &id, &req.url, validated).await);
    }

    let confirmation = sign_payload_for_family(req.family, &validated.address, &validated)?;
    let options = ConfirmationOptions {
        requires_password: req.requires_password,
        address: Some(validated.address.clone()),
        network_key: Some(validated.network_key.clone()),
    };

    let outcome = state.broker.request(
        validated.effective_family(),
        id.clone(),
        req.url,
        confirmation,
        options,
        validated.errors.clone(),
        password_validator(req.requires_password),
    )?;
    let result = outcome.wait().await?;

    success_response(SignMessageResponse {
        id,
        signature: result.signature,
        approved: result.is_approved,
    })
}

/// POST /api/requests/transaction
///
/// 发送交易：同签名消息流程，目前只支持EVM形状的交易载荷
#[utoipa::path(
    post,
    path = "/api/requests/transaction",
    request_body = TransactionRequest,
    responses(
        (status = 200, description = "Approved", body = TransactionResponse),
        (status = 400, description = "Validation failed", body = crate::error_body::ErrorBodyDoc),
        (status = 403, description = "Rejected by user", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn request_transaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TransactionRequest>,
) -> Result<Json<ApiResponse<TransactionResponse>>, AppError> {
    if req.family != ConfirmationFamily::Evm {
        return Err(AppError::chain_not_supported(
            "transaction requests are only supported for the evm family",
        ));
    }

    let id = req.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let payload = req.payload.clone();

    let envelope = PayloadValidated::new(req.family, payload.clone())
        .with_address(payload.from.clone())
        .with_network(payload.network_key.clone());
    let validated = validate(
        &state.validation,
        &req.url,
        envelope,
        &validation_pipeline::send_transaction_steps(),
        None,
    )
    .await;

    if !validated.is_clean() {
        return Err(reject_or_acknowledge(&state, &id, &req.url, validated).await);
    }

    let tx = &validated.payload;
    let confirmation = ConfirmationPayload::EvmSendTransaction {
        from: tx.from.clone(),
        to: tx.to.clone(),
        value: tx.value.clone(),
        network_key: validated.network_key.clone(),
        data: tx.data.clone(),
    };
    let options = ConfirmationOptions {
        requires_password: req.requires_password,
        address: Some(validated.address.clone()),
        network_key: Some(validated.network_key.clone()),
    };

    let outcome = state.broker.request(
        validated.effective_family(),
        id.clone(),
        req.url,
        confirmation,
        options,
        validated.errors.clone(),
        password_validator(req.requires_password),
    )?;
    let result = outcome.wait().await?;

    success_response(TransactionResponse {
        id,
        signature: result.signature,
        approved: result.is_approved,
    })
}

/// GET /api/confirmations
///
/// 当前队列快照：{家族 -> {id -> 条目}}
#[utoipa::path(
    get,
    path = "/api/confirmations",
    responses((status = 200, description = "Queue snapshot per family"))
)]
pub async fn list_confirmations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let snapshot = state.broker.queues();
    success_response(serde_json::to_value(snapshot)?)
}

/// GET /api/confirmations/pending-count
#[utoipa::path(
    get,
    path = "/api/confirmations/pending-count",
    responses((status = 200, description = "Aggregate pending count", body = PendingCountResponse))
)]
pub async fn pending_count(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<PendingCountResponse>>, AppError> {
    success_response(PendingCountResponse {
        count: state.broker.pending_count(),
    })
}

/// POST /api/confirmations/complete
///
/// UI侧按家族批量回填确认结果
#[utoipa::path(
    post,
    path = "/api/confirmations/complete",
    request_body = CompleteRequest,
    responses(
        (status = 200, description = "Settled", body = CompleteResponse),
        (status = 404, description = "Unknown confirmation id", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn complete_confirmations(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<ApiResponse<CompleteResponse>>, AppError> {
    state.broker.complete(req.results)?;
    success_response(CompleteResponse { settled: true })
}

/// POST /api/confirmations/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/confirmations/{id}/cancel",
    params(("id" = String, Path, description = "Confirmation id")),
    responses(
        (status = 200, description = "Cancelled", body = CancelResponse),
        (status = 404, description = "Unknown confirmation id", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn cancel_confirmation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CancelResponse>>, AppError> {
    state.broker.cancel(&id)?;
    success_response(CancelResponse { cancelled: true })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 内部辅助
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 把入站签名载荷映射为家族对应的确认载荷变体
fn sign_payload_for_family(
    family: ConfirmationFamily,
    address: &str,
    validated: &PayloadValidated<SignMessagePayload>,
) -> Result<ConfirmationPayload, AppError> {
    let message = validated.payload.message.clone();
    let network_key = validated.network_key.clone();
    match family {
        ConfirmationFamily::Evm => Ok(ConfirmationPayload::EvmSignMessage {
            address: address.to_string(),
            network_key,
            message,
        }),
        ConfirmationFamily::Substrate => Ok(ConfirmationPayload::SubstrateSignExtrinsic {
            address: address.to_string(),
            network_key,
            call_data: message,
        }),
        ConfirmationFamily::Cardano => Ok(ConfirmationPayload::CardanoSignData {
            address: address.to_string(),
            network_key,
            payload_hex: message,
        }),
        ConfirmationFamily::Bitcoin => Ok(ConfirmationPayload::BitcoinSignPsbt {
            address: address.to_string(),
            network_key,
            psbt: message,
        }),
        ConfirmationFamily::Generic => Err(AppError::chain_not_supported(
            "sign-message requests need a chain family",
        )),
    }
}

/// 需要密码的请求装配中心化校验器：名义批准但缺密码时走拒绝路径
fn password_validator(requires_password: bool) -> Option<ResultValidator> {
    if !requires_password {
        return None;
    }
    Some(Box::new(|result: &ConfirmationResult| {
        if result.is_approved
            && result
                .password
                .as_deref()
                .map_or(true, |password| password.is_empty())
        {
            return Err(AppError::bad_request("approval requires a password"));
        }
        Ok(())
    }))
}

/// 验证失败的出口
/// 被重定向的失败先入通用家族让用户知晓，再以验证错误回绝调用方
async fn reject_or_acknowledge<T: Send + 'static>(
    state: &Arc<AppState>,
    id: &str,
    url: &str,
    validated: PayloadValidated<T>,
) -> AppError {
    let first_error = validated
        .errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "validation failed".into());

    if validated.confirmation_override == Some(ConfirmationFamily::Generic) {
        let acknowledge = ConfirmationPayload::ErrorAcknowledge {
            network_key: validated.network_key.clone(),
            message: first_error.clone(),
        };
        match state.broker.request(
            ConfirmationFamily::Generic,
            format!("{}-error", id),
            url.to_string(),
            acknowledge,
            ConfirmationOptions::default(),
            validated.errors.clone(),
            None,
        ) {
            Ok(outcome) => {
                // 等用户知晓后再回绝
                let _ = outcome.wait().await;
            }
            Err(e) => {
                tracing::warn!("error acknowledge enqueue failed: {}", e);
            }
        }
    }

    AppError::validation_failed(first_error)
}
