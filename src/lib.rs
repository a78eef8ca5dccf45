//! WalletCore - 多链钱包后台编排核心
//!
//! 把不可信的异步请求变成经过用户批准的签名结果：
//! 验证管线、确认队列、外部签名登记、进程生命周期状态机

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod error_body;
pub mod infrastructure;
pub mod metrics;
pub mod service;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode};

// 统一模块导出
pub mod prelude {
    pub use crate::{
        app_state::AppState,
        domain::{ConfirmationFamily, ConfirmationPayload, ConfirmationResult, LifecycleState},
        error::{AppError, AppErrorCode},
        service::{ConfirmationBroker, LifecycleController},
    };
}
