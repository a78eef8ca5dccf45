//! 进程生命周期控制器
//! 休眠/唤醒状态机，并发入口合流到同一次在途转换
//!
//! 浏览器弹窗、定时闹钟、内容脚本消息可能在同一瞬间各自触发
//! 唤醒或休眠，这里保证 STARTING/STARTING_FULL/STOPPING 同时至多
//! 一个在途，其余调用方等待同一个共享future，副作用不会重复执行

use std::sync::{Arc, Mutex};

use futures::future::{join_all, BoxFuture, FutureExt, Shared};

use crate::{
    domain::lifecycle::LifecycleState,
    infrastructure::{NetworkService, Subsystem},
    metrics,
};

type SharedOp = Shared<BoxFuture<'static, ()>>;

/// 单锁保护状态与在途转换，决策原子化
struct Control {
    state: LifecycleState,
    starting: Option<SharedOp>,
    starting_full: Option<SharedOp>,
    stopping: Option<SharedOp>,
}

struct LifecycleInner {
    control: Mutex<Control>,
    network: Arc<dyn NetworkService>,
    /// 余额/历史/价格等索引器，完整唤醒阶段启动
    indexers: Vec<Arc<dyn Subsystem>>,
    /// 周期任务调度与订阅执行器，休眠时最先停止
    runners: Vec<Arc<dyn Subsystem>>,
}

pub struct LifecycleController {
    inner: Arc<LifecycleInner>,
}

impl LifecycleController {
    pub fn new(
        network: Arc<dyn NetworkService>,
        indexers: Vec<Arc<dyn Subsystem>>,
        runners: Vec<Arc<dyn Subsystem>>,
    ) -> Self {
        Self {
            inner: Arc::new(LifecycleInner {
                control: Mutex::new(Control {
                    state: LifecycleState::Initializing,
                    starting: None,
                    starting_full: None,
                    stopping: None,
                }),
                network,
                indexers,
                runners,
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock_control().state
    }

    /// 周期任务调度器运行任务前查询
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// 唤醒：阶段一恢复基础能力，full时继续阶段二启动全部依赖子系统
    pub async fn wakeup(&self, full: bool) {
        self.start_base().await;
        if full {
            self.start_full().await;
        }
    }

    /// 休眠
    /// 绝不打断在途启动：先等启动走完，再在同一把锁下决定停止
    pub async fn sleep(&self) {
        let op = loop {
            let pending_start = {
                let mut control = self.inner.lock_control();
                let in_flight = control
                    .starting
                    .clone()
                    .or_else(|| control.starting_full.clone());
                match in_flight {
                    Some(op) => Some(op),
                    None => {
                        if control.state == LifecycleState::Stopped {
                            return;
                        }
                        if let Some(existing) = control.stopping.clone() {
                            // 已有在途停止，挂到同一个future上
                            break existing;
                        }
                        self.inner
                            .set_state_locked(&mut control, LifecycleState::Stopping);
                        let inner = self.inner.clone();
                        let op: SharedOp = async move { inner.run_stop().await }.boxed().shared();
                        control.stopping = Some(op.clone());
                        break op;
                    }
                }
            };
            if let Some(op) = pending_start {
                op.await;
            }
        };
        op.await;
    }

    // ============ 阶段一：基础启动 ============

    async fn start_base(&self) {
        let op = loop {
            // 在途停止先走完，启动决策与检查在同一把锁下完成
            let pending_stop = {
                let mut control = self.inner.lock_control();
                match control.stopping.clone() {
                    Some(op) => Some(op),
                    None => {
                        if control.state.is_at_least_started() {
                            return;
                        }
                        if let Some(existing) = control.starting.clone() {
                            metrics::count_wakeup_coalesced();
                            break existing;
                        }
                        let from_stopped = control.state == LifecycleState::Stopped;
                        self.inner
                            .set_state_locked(&mut control, LifecycleState::Starting);
                        let inner = self.inner.clone();
                        let op: SharedOp = async move { inner.run_start(from_stopped).await }
                            .boxed()
                            .shared();
                        control.starting = Some(op.clone());
                        break op;
                    }
                }
            };
            if let Some(op) = pending_stop {
                op.await;
            }
        };
        op.await;
    }

    // ============ 阶段二：完整启动 ============

    async fn start_full(&self) {
        let op = {
            let mut control = self.inner.lock_control();
            match control.state {
                LifecycleState::StartedFull => return,
                LifecycleState::StartingFull => match control.starting_full.clone() {
                    Some(existing) => {
                        metrics::count_wakeup_coalesced();
                        existing
                    }
                    None => return,
                },
                LifecycleState::Started => {
                    self.inner
                        .set_state_locked(&mut control, LifecycleState::StartingFull);
                    let inner = self.inner.clone();
                    let op: SharedOp = async move { inner.run_start_full().await }.boxed().shared();
                    control.starting_full = Some(op.clone());
                    op
                }
                // 阶段二只能从 STARTED 进入
                _ => return,
            }
        };
        op.await;
    }
}

impl LifecycleInner {
    fn lock_control(&self) -> std::sync::MutexGuard<'_, Control> {
        match self.control.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn set_state_locked(&self, control: &mut Control, next: LifecycleState) {
        tracing::info!(
            from = control.state.as_str(),
            to = next.as_str(),
            "lifecycle transition"
        );
        control.state = next;
        metrics::count_lifecycle_transition();
    }

    async fn run_start(self: Arc<Self>, from_stopped: bool) {
        // 从STOPPED唤醒时恢复链连接；每条链的失败只记日志
        if from_stopped {
            for (chain, result) in self.network.resume_all().await {
                if let Err(e) = result {
                    tracing::warn!(chain = %chain, "network resume failed: {}", e);
                }
            }
        }

        let mut control = self.lock_control();
        self.set_state_locked(&mut control, LifecycleState::Started);
        control.starting = None;
    }

    async fn run_start_full(self: Arc<Self>) {
        // 周期任务、订阅执行器与全部索引器并行启动
        // 单个子系统的失败被隔离，不阻塞其它子系统
        let all = self.runners.iter().chain(self.indexers.iter());
        join_all(all.map(|subsystem| {
            let subsystem = subsystem.clone();
            async move {
                if let Err(e) = subsystem.start().await {
                    tracing::warn!(subsystem = subsystem.name(), "start failed: {}", e);
                }
            }
        }))
        .await;

        let mut control = self.lock_control();
        self.set_state_locked(&mut control, LifecycleState::StartedFull);
        control.starting_full = None;
    }

    async fn run_stop(self: Arc<Self>) {
        // 顺序：先停周期任务与订阅，再暂停链连接，最后停索引器
        join_all(self.runners.iter().map(|subsystem| {
            let subsystem = subsystem.clone();
            async move {
                if let Err(e) = subsystem.stop().await {
                    tracing::warn!(subsystem = subsystem.name(), "stop failed: {}", e);
                }
            }
        }))
        .await;

        for (chain, result) in self.network.pause_all().await {
            if let Err(e) = result {
                tracing::warn!(chain = %chain, "network pause failed: {}", e);
            }
        }

        join_all(self.indexers.iter().map(|subsystem| {
            let subsystem = subsystem.clone();
            async move {
                if let Err(e) = subsystem.stop().await {
                    tracing::warn!(subsystem = subsystem.name(), "stop failed: {}", e);
                }
            }
        }))
        .await;

        let mut control = self.lock_control();
        self.set_state_locked(&mut control, LifecycleState::Stopped);
        control.stopping = None;
    }
}
