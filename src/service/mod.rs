pub mod confirmation_broker;
pub mod external_request_registry;
pub mod lifecycle_controller;
pub mod subscription_registry;
pub mod validation_pipeline;

// 重新导出常用类型
pub use confirmation_broker::{ConfirmationBroker, PendingOutcome, ResultValidator};
pub use external_request_registry::{
    ExternalOutcome, ExternalRequestRegistry, ExternalRequestSweeper,
};
pub use lifecycle_controller::LifecycleController;
pub use subscription_registry::{SubscriptionRegistry, SubscriptionRunner};
pub use validation_pipeline::{validate, NetworkInfo, ValidationContext, ValidationStep};
