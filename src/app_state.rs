use std::sync::Arc;

use crate::{
    config::Config,
    infrastructure::{
        BadgeSink, ConfirmationSurface, LoggingBadge, LoggingSurface, NetworkService,
        NoopNetworkService, Subsystem,
    },
    service::{
        ConfirmationBroker, ExternalRequestRegistry, ExternalRequestSweeper, LifecycleController,
        SubscriptionRegistry, SubscriptionRunner, ValidationContext,
    },
};

/// 应用状态
/// 编排核心的全部共享组件
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub validation: Arc<ValidationContext>,
    pub broker: Arc<ConfirmationBroker>,
    pub external_requests: Arc<ExternalRequestRegistry>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub lifecycle: Arc<LifecycleController>,
}

impl AppState {
    /// 守护进程默认装配：日志型界面/角标、空链连接、内建子系统
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(LoggingSurface),
            Arc::new(LoggingBadge),
            Arc::new(NoopNetworkService),
            Vec::new(),
        )
    }

    /// 注入协作方的装配入口，测试与宿主进程都从这里进
    pub fn with_collaborators(
        config: Arc<Config>,
        surface: Arc<dyn ConfirmationSurface>,
        badge: Arc<dyn BadgeSink>,
        network: Arc<dyn NetworkService>,
        indexers: Vec<Arc<dyn Subsystem>>,
    ) -> Self {
        let validation = Arc::new(ValidationContext::with_default_networks());
        let broker = Arc::new(ConfirmationBroker::new(surface, badge));
        let external_requests = Arc::new(ExternalRequestRegistry::new());
        let subscriptions = Arc::new(SubscriptionRegistry::new());

        // 内建runner：外部请求清扫 + 订阅执行器，随生命周期启停
        let sweeper = Arc::new(ExternalRequestSweeper::new(
            external_requests.clone(),
            config.confirmation.external_request_max_age_secs,
            config.confirmation.sweep_interval_secs,
        ));
        let subscription_runner = Arc::new(SubscriptionRunner::new(subscriptions.clone()));
        let runners: Vec<Arc<dyn Subsystem>> = vec![sweeper, subscription_runner];

        let lifecycle = Arc::new(LifecycleController::new(network, indexers, runners));

        Self {
            config,
            validation,
            broker,
            external_requests,
            subscriptions,
            lifecycle,
        }
    }
}
