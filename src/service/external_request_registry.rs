//! 外部请求登记表
//! 挂起由外部执行者驱动的签名流程：硬件钱包轮询、二维码扫描、注入钱包回传
//!
//! 结算能力在创建时装配为一次性通道，用掉即清除；
//! 周期清扫移除终态条目和超龄条目，防止崩溃的外部流程永久滞留

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{
    domain::external_request::{
        ExternalRequestSnapshot, ExternalRequestStatus, ExternalRequestUpdate,
    },
    error::AppError,
    infrastructure::Subsystem,
    metrics,
};

/// 原始调用方等待外部流程回传的句柄
#[derive(Debug)]
pub struct ExternalOutcome {
    rx: oneshot::Receiver<Result<serde_json::Value, AppError>>,
}

impl ExternalOutcome {
    pub async fn wait(self) -> Result<serde_json::Value, AppError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            // 条目被清扫后能力已清除
            Err(_) => Err(AppError::user_rejected(
                "external request expired before completion",
            )),
        }
    }
}

struct ExternalEntry {
    status: ExternalRequestStatus,
    created_at: DateTime<Utc>,
    settle: Option<oneshot::Sender<Result<serde_json::Value, AppError>>>,
}

pub struct ExternalRequestRegistry {
    entries: Mutex<HashMap<String, ExternalEntry>>,
}

impl Default for ExternalRequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalRequestRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, ExternalEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 登记一条PENDING条目并返回等待句柄
    pub fn create(&self, id: impl Into<String>) -> Result<ExternalOutcome, AppError> {
        let id = id.into();
        let mut entries = self.lock_entries();
        if entries.contains_key(&id) {
            return Err(AppError::duplicate_request(format!(
                "external request already registered: {}",
                id
            )));
        }

        let (tx, rx) = oneshot::channel();
        entries.insert(
            id.clone(),
            ExternalEntry {
                status: ExternalRequestStatus::Pending,
                created_at: Utc::now(),
                settle: Some(tx),
            },
        );
        drop(entries);

        metrics::count_external_request_created();
        tracing::debug!(id = %id, "external request registered");
        Ok(ExternalOutcome { rx })
    }

    /// 合并部分更新
    /// 目标id不存在时是空操作：发起流程可能已经被清扫掉
    pub fn update(&self, id: &str, update: ExternalRequestUpdate) {
        let mut entries = self.lock_entries();
        match entries.get_mut(id) {
            Some(entry) => {
                if let Some(status) = update.status {
                    entry.status = status;
                }
            }
            None => {
                tracing::debug!(id = %id, "update for unknown external request ignored");
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<ExternalRequestSnapshot> {
        self.lock_entries().get(id).map(|entry| ExternalRequestSnapshot {
            id: id.to_string(),
            status: entry.status,
            created_at: entry.created_at,
        })
    }

    pub fn snapshot_all(&self) -> Vec<ExternalRequestSnapshot> {
        self.lock_entries()
            .iter()
            .map(|(id, entry)| ExternalRequestSnapshot {
                id: id.clone(),
                status: entry.status,
                created_at: entry.created_at,
            })
            .collect()
    }

    /// 外部执行者回报结果，消耗结算能力并进入终态
    pub fn settle(
        &self,
        id: &str,
        outcome: Result<serde_json::Value, AppError>,
    ) -> Result<(), AppError> {
        let sender = {
            let mut entries = self.lock_entries();
            let entry = entries
                .get_mut(id)
                .ok_or_else(|| AppError::not_found(format!("no external request: {}", id)))?;
            let sender = entry.settle.take().ok_or_else(|| {
                AppError::not_found(format!("external request already settled: {}", id))
            })?;
            entry.status = if outcome.is_ok() {
                ExternalRequestStatus::Completed
            } else {
                ExternalRequestStatus::Rejected
            };
            sender
        };

        tracing::debug!(id = %id, "external request settled");
        let _ = sender.send(outcome);
        Ok(())
    }

    /// 清扫：终态条目不论年龄一律移除，超龄条目不论状态一律移除
    /// 移除前先取走结算能力，保证不会出现悬挂的二次结算
    pub fn sweep(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let mut removed = 0usize;
        {
            let mut entries = self.lock_entries();
            entries.retain(|id, entry| {
                let stale = now.signed_duration_since(entry.created_at) > max_age;
                let drop_entry = entry.status.is_terminal() || stale;
                if drop_entry {
                    entry.settle.take();
                    tracing::debug!(id = %id, status = entry.status.as_str(), stale = stale,
                        "external request swept");
                    removed += 1;
                }
                !drop_entry
            });
        }
        if removed > 0 {
            metrics::count_external_requests_swept(removed);
            tracing::info!(removed = removed, "external request sweep finished");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }
}

// ============ 周期清扫子系统 ============

/// 以生命周期子系统的形式运行周期清扫
/// 钱包休眠时随其它子系统一起停止
pub struct ExternalRequestSweeper {
    registry: Arc<ExternalRequestRegistry>,
    max_age: Duration,
    interval: std::time::Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ExternalRequestSweeper {
    pub fn new(
        registry: Arc<ExternalRequestRegistry>,
        max_age_secs: u64,
        interval_secs: u64,
    ) -> Self {
        Self {
            registry,
            max_age: Duration::seconds(max_age_secs as i64),
            interval: std::time::Duration::from_secs(interval_secs),
            handle: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Subsystem for ExternalRequestSweeper {
    fn name(&self) -> &'static str {
        "external_request_sweeper"
    }

    async fn start(&self) -> anyhow::Result<()> {
        let registry = self.registry.clone();
        let max_age = self.max_age;
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                registry.sweep(Utc::now(), max_age);
            }
        });

        let mut handle = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = handle.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let task = {
            let mut handle = match self.handle.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            handle.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settle_resolves_waiter_once() {
        let registry = ExternalRequestRegistry::new();
        let outcome = registry.create("qr-1").unwrap();

        registry
            .settle("qr-1", Ok(serde_json::json!({"signature": "0xdead"})))
            .unwrap();
        let value = outcome.wait().await.unwrap();
        assert_eq!(value["signature"], "0xdead");

        // 结算能力已清除
        let err = registry
            .settle("qr-1", Ok(serde_json::Value::Null))
            .unwrap_err();
        assert_eq!(err.code, crate::error::AppErrorCode::NotFound);
        assert_eq!(
            registry.get("qr-1").unwrap().status,
            ExternalRequestStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_duplicate_create_fails() {
        let registry = ExternalRequestRegistry::new();
        let _outcome = registry.create("qr-1").unwrap();
        let err = registry.create("qr-1").unwrap_err();
        assert_eq!(err.code, crate::error::AppErrorCode::DuplicateRequest);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_noop() {
        let registry = ExternalRequestRegistry::new();
        registry.update(
            "ghost",
            ExternalRequestUpdate {
                status: Some(ExternalRequestStatus::Completed),
            },
        );
        assert!(registry.get("ghost").is_none());
    }

    #[tokio::test]
    async fn test_sweep_dual_criterion() {
        let registry = ExternalRequestRegistry::new();
        let _fresh_pending = registry.create("fresh-pending").unwrap();
        let _fresh_done = registry.create("fresh-done").unwrap();
        let _stale_pending = registry.create("stale-pending").unwrap();

        registry
            .settle("fresh-done", Ok(serde_json::Value::Null))
            .unwrap();
        // 人为做旧
        {
            let mut entries = registry.lock_entries();
            entries.get_mut("stale-pending").unwrap().created_at =
                Utc::now() - Duration::seconds(3600);
        }

        let removed = registry.sweep(Utc::now(), Duration::seconds(900));
        assert_eq!(removed, 2);
        assert!(registry.get("fresh-pending").is_some());
        assert!(registry.get("fresh-done").is_none());
        assert!(registry.get("stale-pending").is_none());
    }

    #[tokio::test]
    async fn test_swept_waiter_sees_expiry() {
        let registry = ExternalRequestRegistry::new();
        let outcome = registry.create("stale").unwrap();
        {
            let mut entries = registry.lock_entries();
            entries.get_mut("stale").unwrap().created_at = Utc::now() - Duration::seconds(3600);
        }
        registry.sweep(Utc::now(), Duration::seconds(900));

        let err = outcome.wait().await.unwrap_err();
        assert_eq!(err.code, crate::error::AppErrorCode::UserRejected);
        assert!(err.message.contains("expired"));
    }
}
