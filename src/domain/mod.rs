//! Domain 模块
//!
//! 包含编排核心的领域模型

pub mod confirmation;
pub mod external_request;
pub mod lifecycle;
pub mod validation;

// Re-exports
// 重新导出常用类型
pub use confirmation::{
    ConfirmationFamily, ConfirmationOptions, ConfirmationPayload, ConfirmationRequest,
    ConfirmationResult, QueueSnapshot,
};
pub use external_request::{ExternalRequestSnapshot, ExternalRequestStatus, ExternalRequestUpdate};
pub use lifecycle::LifecycleState;
pub use validation::{PayloadValidated, ValidationError, ValidationErrorKind};
