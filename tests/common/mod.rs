//! 测试辅助模块
//! 提供记录型协作方替身和应用状态工厂

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use walletcore::{
    app_state::AppState,
    config::Config,
    infrastructure::{BadgeSink, ConfirmationSurface, NetworkService, Subsystem},
};

/// 记录界面调用次数的替身
pub struct RecordingSurface {
    pub opens: AtomicUsize,
    pub focuses: AtomicUsize,
    pub closes: AtomicUsize,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            opens: AtomicUsize::new(0),
            focuses: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ConfirmationSurface for RecordingSurface {
    async fn ensure_visible(&self) -> anyhow::Result<()> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn focus_existing(&self) -> anyhow::Result<()> {
        self.focuses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 记录角标文本历史的替身
pub struct RecordingBadge {
    pub history: Mutex<Vec<String>>,
}

impl RecordingBadge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            history: Mutex::new(Vec::new()),
        })
    }

    pub fn last(&self) -> Option<String> {
        self.history.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl BadgeSink for RecordingBadge {
    async fn set_text(&self, text: &str) {
        self.history.lock().unwrap().push(text.to_string());
    }
}

/// 记录暂停/恢复次数的链连接替身
pub struct RecordingNetwork {
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
}

impl RecordingNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl NetworkService for RecordingNetwork {
    async fn pause_all(&self) -> Vec<(String, anyhow::Result<()>)> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        vec![("ethereum".into(), Ok(())), ("bitcoin".into(), Ok(()))]
    }

    async fn resume_all(&self) -> Vec<(String, anyhow::Result<()>)> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        vec![("ethereum".into(), Ok(())), ("bitcoin".into(), Ok(()))]
    }
}

/// 记录启动/停止次数的索引器替身
pub struct RecordingIndexer {
    pub name: &'static str,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl RecordingIndexer {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Subsystem for RecordingIndexer {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 测试配置：短清扫间隔
pub fn test_config() -> Arc<Config> {
    let mut config = Config::default();
    config.confirmation.external_request_max_age_secs = 900;
    config.confirmation.sweep_interval_secs = 1;
    Arc::new(config)
}

/// 默认替身装配的应用状态
pub fn create_test_app_state() -> (Arc<AppState>, Arc<RecordingSurface>, Arc<RecordingBadge>) {
    let surface = RecordingSurface::new();
    let badge = RecordingBadge::new();
    let network = RecordingNetwork::new();
    let state = Arc::new(AppState::with_collaborators(
        test_config(),
        surface.clone(),
        badge.clone(),
        network,
        Vec::new(),
    ));
    (state, surface, badge)
}
