use serde::Serialize;
use utoipa::ToSchema;

/// 错误响应文档模型，仅用于OpenAPI展示
#[derive(Serialize, ToSchema)]
pub struct ErrorBodyDoc {
    pub code: String,
    pub message: String,
    pub trace_id: Option<String>,
}
