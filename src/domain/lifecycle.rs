//! 钱包进程生命周期状态
//! 唯一持有者为 LifecycleController，其它组件只读

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 生命周期状态机的状态集合
///
/// 合法转换：
/// - INITIALIZING -> STARTING
/// - STARTING -> STARTED
/// - STARTED -> STARTING_FULL -> STARTED_FULL
/// - 任意已启动状态 -> STOPPING -> STOPPED
/// - STOPPED -> STARTING
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Initializing,
    Starting,
    Started,
    StartingFull,
    StartedFull,
    Stopping,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::StartingFull => "starting_full",
            Self::StartedFull => "started_full",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }

    /// 基础启动阶段是否已完成
    pub fn is_at_least_started(&self) -> bool {
        matches!(self, Self::Started | Self::StartingFull | Self::StartedFull)
    }

    /// 周期任务调度器在运行任务前查询此判定
    pub fn is_active(&self) -> bool {
        self.is_at_least_started()
    }
}
