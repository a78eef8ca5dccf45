use std::sync::Arc;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app_state::AppState;

pub mod confirmation_api;
pub mod external_api;
pub mod lifecycle_api;
pub mod middleware;
pub mod response;
pub mod system_api;

/// OpenAPI 文档
#[derive(OpenApi)]
#[openapi(
    paths(
        confirmation_api::request_sign_message,
        confirmation_api::request_transaction,
        confirmation_api::list_confirmations,
        confirmation_api::pending_count,
        confirmation_api::complete_confirmations,
        confirmation_api::cancel_confirmation,
        external_api::create_external_request,
        external_api::get_external_request,
        external_api::update_external_request,
        external_api::settle_external_request,
        external_api::sweep_external_requests,
        lifecycle_api::lifecycle_state,
        lifecycle_api::sleep,
        lifecycle_api::wakeup,
        system_api::healthz,
    ),
    components(schemas(
        crate::domain::confirmation::ConfirmationFamily,
        crate::domain::confirmation::ConfirmationPayload,
        crate::domain::confirmation::ConfirmationOptions,
        crate::domain::confirmation::ConfirmationRequest,
        crate::domain::confirmation::ConfirmationResult,
        crate::domain::confirmation::SignMessagePayload,
        crate::domain::confirmation::SendTransactionPayload,
        crate::domain::validation::ValidationError,
        crate::domain::validation::ValidationErrorKind,
        crate::domain::external_request::ExternalRequestStatus,
        crate::domain::external_request::ExternalRequestUpdate,
        crate::domain::external_request::ExternalRequestSnapshot,
        crate::domain::lifecycle::LifecycleState,
        crate::error_body::ErrorBodyDoc,
        confirmation_api::SignMessageRequest,
        confirmation_api::SignMessageResponse,
        confirmation_api::TransactionRequest,
        confirmation_api::TransactionResponse,
        confirmation_api::CompleteRequest,
        confirmation_api::CompleteResponse,
        confirmation_api::CancelResponse,
        confirmation_api::PendingCountResponse,
        external_api::CreateExternalRequest,
        external_api::SettleExternalRequest,
        external_api::SettleResponse,
        external_api::SweepRequest,
        external_api::SweepResponse,
        lifecycle_api::WakeupRequest,
        lifecycle_api::LifecycleStateResponse,
        system_api::Healthz,
    )),
    tags(
        (name = "confirmations", description = "Confirmation queue"),
        (name = "external-requests", description = "External signing flows"),
        (name = "lifecycle", description = "Wallet lifecycle")
    )
)]
pub struct ApiDoc;

/// 组装路由
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(system_api::healthz))
        .route("/metrics", get(system_api::metrics_text))
        .route(
            "/api/requests/sign-message",
            post(confirmation_api::request_sign_message),
        )
        .route(
            "/api/requests/transaction",
            post(confirmation_api::request_transaction),
        )
        .route("/api/confirmations", get(confirmation_api::list_confirmations))
        .route(
            "/api/confirmations/pending-count",
            get(confirmation_api::pending_count),
        )
        .route(
            "/api/confirmations/complete",
            post(confirmation_api::complete_confirmations),
        )
        .route(
            "/api/confirmations/:id/cancel",
            post(confirmation_api::cancel_confirmation),
        )
        .route(
            "/api/external-requests",
            post(external_api::create_external_request),
        )
        .route(
            "/api/external-requests/sweep",
            post(external_api::sweep_external_requests),
        )
        .route(
            "/api/external-requests/:id",
            get(external_api::get_external_request).patch(external_api::update_external_request),
        )
        .route(
            "/api/external-requests/:id/settle",
            post(external_api::settle_external_request),
        )
        .route("/api/lifecycle/state", get(lifecycle_api::lifecycle_state))
        .route("/api/lifecycle/sleep", post(lifecycle_api::sleep))
        .route("/api/lifecycle/wakeup", post(lifecycle_api::wakeup))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(middleware::trace_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
