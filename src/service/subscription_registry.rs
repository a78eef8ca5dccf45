//! 订阅登记表
//! 长时间运行的查询订阅按id登记，退订即"查找、移除、执行清理"
//!
//! 与确认队列无关，但共享同一套按id清理的纪律

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::infrastructure::Subsystem;

type Teardown = Box<dyn FnOnce() + Send>;

pub struct SubscriptionRegistry {
    subs: Mutex<HashMap<String, Teardown>>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subs: Mutex::new(HashMap::new()),
        }
    }

    fn lock_subs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Teardown>> {
        match self.subs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 登记一条订阅及其清理动作
    /// 同id重复登记时先清理旧订阅再替换
    pub fn subscribe(&self, id: impl Into<String>, teardown: Teardown) {
        let id = id.into();
        let previous = self.lock_subs().insert(id.clone(), teardown);
        if let Some(old) = previous {
            tracing::warn!(id = %id, "subscription replaced, tearing down previous");
            old();
        }
    }

    /// 退订：存在则移除并执行清理，返回是否命中
    pub fn unsubscribe(&self, id: &str) -> bool {
        let teardown = self.lock_subs().remove(id);
        match teardown {
            Some(teardown) => {
                tracing::debug!(id = %id, "subscription removed");
                teardown();
                true
            }
            None => false,
        }
    }

    /// 清空全部订阅，休眠时调用
    pub fn unsubscribe_all(&self) {
        let drained: Vec<(String, Teardown)> = self.lock_subs().drain().collect();
        let count = drained.len();
        for (_, teardown) in drained {
            teardown();
        }
        if count > 0 {
            tracing::info!(count = count, "all subscriptions removed");
        }
    }

    pub fn len(&self) -> usize {
        self.lock_subs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_subs().is_empty()
    }
}

/// 订阅执行器子系统：休眠阶段负责清空存活订阅
pub struct SubscriptionRunner {
    registry: Arc<SubscriptionRegistry>,
}

impl SubscriptionRunner {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Subsystem for SubscriptionRunner {
    fn name(&self) -> &'static str {
        "subscription_runner"
    }

    async fn start(&self) -> anyhow::Result<()> {
        // 订阅按需登记，启动阶段无事可做
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.registry.unsubscribe_all();
        Ok(())
    }
}
