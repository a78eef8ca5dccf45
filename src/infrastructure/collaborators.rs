//! 协作方接口
//! 编排核心只依赖这些窄接口，UI渲染、链RPC、各类索引器都在进程外实现

use anyhow::Result;
use async_trait::async_trait;

// ============ 确认界面 ============

/// 确认界面控制器
/// 队列出现新条目时保证有一个可见界面；清空后关闭
#[async_trait]
pub trait ConfirmationSurface: Send + Sync {
    /// 打开一个确认界面，多次调用只允许出现一个
    async fn ensure_visible(&self) -> Result<()>;
    /// 聚焦已打开的界面
    async fn focus_existing(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

// ============ 角标 ============

/// 待确认数量的展示通道
/// 空字符串表示清除角标
#[async_trait]
pub trait BadgeSink: Send + Sync {
    async fn set_text(&self, text: &str);
}

// ============ 链连接 ============

/// 链网络连接控制，休眠/唤醒时整体暂停与恢复
/// 返回每条链的结果，失败只记录日志不向上传播
#[async_trait]
pub trait NetworkService: Send + Sync {
    async fn pause_all(&self) -> Vec<(String, Result<()>)>;
    async fn resume_all(&self) -> Vec<(String, Result<()>)>;
}

// ============ 依赖子系统 ============

/// 依赖子系统：余额/历史/价格等索引器、周期任务调度器、订阅执行器
/// 生命周期控制器按阶段并行调用 start/stop 并等待全部完成
#[async_trait]
pub trait Subsystem: Send + Sync {
    fn name(&self) -> &'static str;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

// ============ 守护进程默认实现 ============

/// 默认界面实现：真实UI由进程外协作方承担，这里只落日志
pub struct LoggingSurface;

#[async_trait]
impl ConfirmationSurface for LoggingSurface {
    async fn ensure_visible(&self) -> Result<()> {
        tracing::info!("confirmation surface requested");
        Ok(())
    }

    async fn focus_existing(&self) -> Result<()> {
        tracing::debug!("confirmation surface focused");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("confirmation surface closed");
        Ok(())
    }
}

/// 默认角标实现
pub struct LoggingBadge;

#[async_trait]
impl BadgeSink for LoggingBadge {
    async fn set_text(&self, text: &str) {
        if text.is_empty() {
            tracing::debug!("badge cleared");
        } else {
            tracing::debug!("badge set to {}", text);
        }
    }
}

/// 默认链连接实现：没有注册任何链时的占位
pub struct NoopNetworkService;

#[async_trait]
impl NetworkService for NoopNetworkService {
    async fn pause_all(&self) -> Vec<(String, Result<()>)> {
        Vec::new()
    }

    async fn resume_all(&self) -> Vec<(String, Result<()>)> {
        Vec::new()
    }
}
