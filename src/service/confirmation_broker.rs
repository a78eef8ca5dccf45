//! 确认请求代理
//! 每个链家族一条去重队列，请求方挂起等待用户批准或拒绝
//!
//! 结算严格一次：resolver以一次性通道保存，complete取走后即销毁，
//! 同一id的第二次complete只能得到NotFound

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{oneshot, watch};

use crate::{
    domain::confirmation::{
        ConfirmationFamily, ConfirmationOptions, ConfirmationPayload, ConfirmationRequest,
        ConfirmationResult, QueueSnapshot,
    },
    domain::validation::ValidationError,
    error::AppError,
    infrastructure::{BadgeSink, ConfirmationSurface},
    metrics,
};

/// 结果校验器：结算前对拟定结果做最后一道检查
/// 返回错误时以该错误走拒绝路径，而不是把名义上的批准交还调用方
pub type ResultValidator = Box<dyn Fn(&ConfirmationResult) -> Result<(), AppError> + Send + Sync>;

/// 调用方可见的未决结果
/// 批准 -> Ok(结果)；用户拒绝/校验器拒绝/取消 -> Err(带稳定错误码)
#[derive(Debug)]
pub struct PendingOutcome {
    rx: oneshot::Receiver<Result<ConfirmationResult, AppError>>,
}

impl PendingOutcome {
    pub async fn wait(self) -> Result<ConfirmationResult, AppError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            // 代理被整体丢弃才会走到这里
            Err(_) => Err(AppError::internal(
                "confirmation resolver dropped before settlement",
            )),
        }
    }
}

/// 与队列条目一一配对的结算能力
struct PendingSettle {
    family: ConfirmationFamily,
    sender: oneshot::Sender<Result<ConfirmationResult, AppError>>,
    validator: Option<ResultValidator>,
}

struct BrokerState {
    queues: QueueSnapshot,
    pending: HashMap<String, PendingSettle>,
    /// 调用方另行管理的旧式单条请求数，计入聚合角标
    auxiliary_pending: usize,
    surface_open: bool,
}

enum SurfaceAction {
    Open,
    Focus,
    Close,
    None,
}

pub struct ConfirmationBroker {
    state: Mutex<BrokerState>,
    queue_tx: watch::Sender<QueueSnapshot>,
    surface: Arc<dyn ConfirmationSurface>,
    badge: Arc<dyn BadgeSink>,
}

impl ConfirmationBroker {
    pub fn new(surface: Arc<dyn ConfirmationSurface>, badge: Arc<dyn BadgeSink>) -> Self {
        let mut queues: QueueSnapshot = HashMap::new();
        for family in ConfirmationFamily::all() {
            queues.insert(family, HashMap::new());
        }
        let (queue_tx, _) = watch::channel(queues.clone());

        Self {
            state: Mutex::new(BrokerState {
                queues,
                pending: HashMap::new(),
                auxiliary_pending: 0,
                surface_open: false,
            }),
            queue_tx,
            surface,
            badge,
        }
    }

    /// UI侧订阅队列内容，每次变更收到整体快照 {家族 -> {id -> 条目}}
    pub fn subscribe_queues(&self) -> watch::Receiver<QueueSnapshot> {
        self.queue_tx.subscribe()
    }

    /// 入队一条确认请求并返回未决结果
    ///
    /// 同一家族内 (url, 载荷指纹) 相同的存活条目最多一个，
    /// 命中去重时立刻失败且不产生第二个条目
    pub fn request(
        &self,
        family: ConfirmationFamily,
        id: impl Into<String>,
        url: impl Into<String>,
        payload: ConfirmationPayload,
        options: ConfirmationOptions,
        errors: Vec<ValidationError>,
        validator: Option<ResultValidator>,
    ) -> Result<PendingOutcome, AppError> {
        let id = id.into();
        let url = url.into();
        let fingerprint = payload.fingerprint();

        let (snapshot, count, action, rx) = {
            let mut state = self.lock_state();

            if state.pending.contains_key(&id) {
                metrics::count_confirmation_duplicate();
                return Err(AppError::duplicate_request(format!(
                    "confirmation id already pending: {}",
                    id
                )));
            }

            let queue = state.queues.entry(family).or_default();
            let dup = queue
                .values()
                .any(|entry| entry.url == url && entry.payload_fingerprint == fingerprint);
            if dup {
                metrics::count_confirmation_duplicate();
                return Err(AppError::duplicate_request(format!(
                    "identical confirmation already pending for {}",
                    url
                )));
            }

            let entry = ConfirmationRequest {
                id: id.clone(),
                url,
                payload,
                payload_fingerprint: fingerprint,
                options,
                errors,
                created_at: Utc::now(),
            };
            queue.insert(id.clone(), entry);

            let (tx, rx) = oneshot::channel();
            state.pending.insert(
                id.clone(),
                PendingSettle {
                    family,
                    sender: tx,
                    validator,
                },
            );

            // 界面打开是幂等的：并发请求只触发一次打开，其余聚焦
            let action = if state.surface_open {
                SurfaceAction::Focus
            } else {
                state.surface_open = true;
                SurfaceAction::Open
            };

            (state.queues.clone(), Self::total_pending(&state), action, rx)
        };

        metrics::count_confirmation_requested();
        tracing::info!(id = %id, family = family.as_str(), "confirmation enqueued");
        self.publish(snapshot, count, action);

        Ok(PendingOutcome { rx })
    }

    /// 按家族批量结算确认结果
    ///
    /// 未知id会被上报为NotFound，但不妨碍同批其它结果的结算
    pub fn complete(
        &self,
        results: HashMap<ConfirmationFamily, ConfirmationResult>,
    ) -> Result<(), AppError> {
        let mut missing: Vec<String> = Vec::new();

        for (family, result) in results {
            let (settle, entry_removed) = {
                let mut state = self.lock_state();
                let settle = state.pending.remove(&result.id);
                let removed = settle.is_some() && self.remove_entry(&mut state, &result.id);
                (settle, removed)
            };

            let settle = match settle {
                Some(s) => s,
                None => {
                    // 结算一个不存在的resolver是编程错误，必须上报
                    tracing::error!(id = %result.id, family = family.as_str(),
                        "complete called for unknown confirmation id");
                    missing.push(result.id.clone());
                    continue;
                }
            };

            if settle.family != family {
                tracing::warn!(id = %result.id, expected = settle.family.as_str(),
                    got = family.as_str(), "confirmation completed under a different family key");
            }
            if !entry_removed {
                tracing::warn!(id = %result.id, "resolver existed without a queue entry");
            }

            let outcome = Self::decide_outcome(&settle, result);
            let id_for_log = match &outcome {
                Ok(r) => r.id.clone(),
                Err(e) => format!("(rejected: {})", e.code.as_str()),
            };
            if settle.sender.send(outcome).is_err() {
                tracing::warn!("confirmation caller went away before settlement: {}", id_for_log);
            }

            self.republish_after_removal();
        }

        if !missing.is_empty() {
            return Err(AppError::not_found(format!(
                "no resolver registered for confirmation id(s): {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// 取消一条存活请求：移除条目并以拒绝结算
    pub fn cancel(&self, id: &str) -> Result<(), AppError> {
        let settle = {
            let mut state = self.lock_state();
            let settle = state
                .pending
                .remove(id)
                .ok_or_else(|| AppError::not_found(format!("no pending confirmation: {}", id)))?;
            self.remove_entry(&mut state, id);
            settle
        };

        metrics::count_confirmation_cancelled();
        tracing::info!(id = %id, "confirmation cancelled");
        let _ = settle
            .sender
            .send(Err(AppError::user_rejected("confirmation cancelled")));

        self.republish_after_removal();
        Ok(())
    }

    /// 所有家族存活条目数加上旧式请求数
    pub fn pending_count(&self) -> usize {
        Self::total_pending(&self.lock_state())
    }

    /// 当前队列快照
    pub fn queues(&self) -> QueueSnapshot {
        self.lock_state().queues.clone()
    }

    /// 旧式单条请求计入聚合角标
    pub fn set_auxiliary_pending(&self, count: usize) {
        let (snapshot, total) = {
            let mut state = self.lock_state();
            state.auxiliary_pending = count;
            (state.queues.clone(), Self::total_pending(&state))
        };
        self.publish(snapshot, total, SurfaceAction::None);
    }

    // ============ 内部实现 ============

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BrokerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn total_pending(state: &BrokerState) -> usize {
        state.queues.values().map(HashMap::len).sum::<usize>() + state.auxiliary_pending
    }

    fn remove_entry(&self, state: &mut BrokerState, id: &str) -> bool {
        for queue in state.queues.values_mut() {
            if queue.remove(id).is_some() {
                return true;
            }
        }
        false
    }

    fn decide_outcome(
        settle: &PendingSettle,
        result: ConfirmationResult,
    ) -> Result<ConfirmationResult, AppError> {
        // 校验器先行：批准结果形状不完整时以校验器错误拒绝
        if let Some(validator) = &settle.validator {
            if let Err(e) = validator(&result) {
                metrics::count_confirmation_validator_rejected();
                return Err(AppError::validator_rejected(e.message));
            }
        }

        if result.is_approved {
            metrics::count_confirmation_approved();
            Ok(result)
        } else {
            metrics::count_confirmation_rejected();
            let reason = result
                .reason
                .unwrap_or_else(|| "user rejected the request".into());
            Err(AppError::user_rejected(reason))
        }
    }

    fn republish_after_removal(&self) {
        let (snapshot, count, action) = {
            let mut state = self.lock_state();
            let count = Self::total_pending(&state);
            let action = if count == 0 && state.surface_open {
                state.surface_open = false;
                SurfaceAction::Close
            } else {
                SurfaceAction::None
            };
            (state.queues.clone(), count, action)
        };
        self.publish(snapshot, count, action);
    }

    /// 发布快照并触发界面/角标副作用
    /// 副作用在锁外异步执行，失败只记日志
    fn publish(&self, snapshot: QueueSnapshot, count: usize, action: SurfaceAction) {
        self.queue_tx.send_replace(snapshot);
        metrics::set_confirmations_pending(count);

        let surface = self.surface.clone();
        let badge = self.badge.clone();
        tokio::spawn(async move {
            let text = if count == 0 {
                String::new()
            } else {
                count.to_string()
            };
            badge.set_text(&text).await;

            let result = match action {
                SurfaceAction::Open => surface.ensure_visible().await,
                SurfaceAction::Focus => surface.focus_existing().await,
                SurfaceAction::Close => surface.close().await,
                SurfaceAction::None => Ok(()),
            };
            if let Err(e) = result {
                tracing::warn!("confirmation surface call failed: {}", e);
            }
        });
    }
}
