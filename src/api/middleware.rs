//! Trace ID 中间件
//! 为每个请求生成唯一的 trace_id，用于全链路追踪

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

/// 从请求头提取 trace_id，没有则生成新的
fn get_or_generate(req: &Request) -> String {
    req.headers()
        .get("X-Trace-Id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// trace_id 进请求扩展、出响应头
pub async fn trace_id_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = get_or_generate(&req);
    req.extensions_mut().insert(trace_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert("X-Trace-Id", header_value);
    }
    response
}
