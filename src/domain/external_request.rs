//! 外部签名请求领域模型
//! 跨上下文的长生命周期签名流程（硬件钱包轮询、二维码扫描、注入钱包回传）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 外部请求状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExternalRequestStatus {
    Pending,
    Completed,
    Rejected,
}

impl ExternalRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    /// 终态条目会被下一次清扫移除
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

/// 部分更新：外部流程推进时合并进已有条目
/// 更新不存在的id是空操作，发起流程可能已被清扫掉
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ExternalRequestUpdate {
    pub status: Option<ExternalRequestStatus>,
}

/// 对外可见的条目快照，不携带结算能力
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExternalRequestSnapshot {
    pub id: String,
    pub status: ExternalRequestStatus,
    pub created_at: DateTime<Utc>,
}
