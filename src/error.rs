use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppErrorCode {
    // HTTP 基础错误码
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Timeout,
    Internal,

    // 业务错误码
    ValidationFailed,
    DuplicateRequest,
    UserRejected,
    ValidatorRejected,
    ChainNotSupported,
    ServiceUnavailable,
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    trace_id: Option<&'a str>,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            // HTTP 基础错误码
            AppErrorCode::BadRequest => "bad_request",
            AppErrorCode::Unauthorized => "unauthorized",
            AppErrorCode::Forbidden => "forbidden",
            AppErrorCode::NotFound => "not_found",
            AppErrorCode::Timeout => "timeout",
            AppErrorCode::Internal => "internal",

            // 业务错误码
            AppErrorCode::ValidationFailed => "validation_failed",
            AppErrorCode::DuplicateRequest => "duplicate_request",
            AppErrorCode::UserRejected => "user_rejected",
            AppErrorCode::ValidatorRejected => "validator_rejected",
            AppErrorCode::ChainNotSupported => "chain_not_supported",
            AppErrorCode::ServiceUnavailable => "service_unavailable",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::BadRequest,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
            trace_id: None,
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::Unauthorized,
            message: msg.into(),
            status: StatusCode::UNAUTHORIZED,
            trace_id: None,
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::Forbidden,
            message: msg.into(),
            status: StatusCode::FORBIDDEN,
            trace_id: None,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::NotFound,
            message: msg.into(),
            status: StatusCode::NOT_FOUND,
            trace_id: None,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::Internal,
            message: msg.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            trace_id: None,
        }
    }

    /// 设置追踪ID
    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    // 业务错误辅助函数

    pub fn validation_failed(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::ValidationFailed,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
            trace_id: None,
        }
    }

    /// 同一来源对实质相同的操作重复挂起确认，属于调用方缺陷或页面重复提交
    pub fn duplicate_request(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::DuplicateRequest,
            message: msg.into(),
            status: StatusCode::CONFLICT,
            trace_id: None,
        }
    }

    /// 用户主动拒绝，下游RPC层据此映射成对应链的线级错误
    pub fn user_rejected(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::UserRejected,
            message: msg.into(),
            status: StatusCode::FORBIDDEN,
            trace_id: None,
        }
    }

    /// 结果校验器判定批准结果不完整，例如缺少必需密码
    pub fn validator_rejected(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::ValidatorRejected,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
            trace_id: None,
        }
    }

    pub fn chain_not_supported(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::ChainNotSupported,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
            trace_id: None,
        }
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::ServiceUnavailable,
            message: msg.into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
            trace_id: None,
        }
    }
}

// 从 serde_json 错误转换
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("JSON serialization error: {}", err))
    }
}

// 从 anyhow 错误转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(AppErrorCode::DuplicateRequest.as_str(), "duplicate_request");
        assert_eq!(AppErrorCode::UserRejected.as_str(), "user_rejected");
        assert_eq!(
            AppErrorCode::ValidatorRejected.as_str(),
            "validator_rejected"
        );
    }

    #[test]
    fn test_user_rejected_distinct_from_internal() {
        let rejected = AppError::user_rejected("user declined");
        let internal = AppError::internal("oops");
        assert_ne!(rejected.code, internal.code);
        assert_eq!(rejected.status, StatusCode::FORBIDDEN);
    }
}
