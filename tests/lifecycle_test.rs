//! 生命周期集成测试
//! 并发唤醒合流、休眠顺序、内建runner随生命周期启停

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use walletcore::{app_state::AppState, domain::lifecycle::LifecycleState};

use common::{RecordingBadge, RecordingIndexer, RecordingNetwork, RecordingSurface};

fn app_with_indexer() -> (Arc<AppState>, Arc<RecordingIndexer>, Arc<RecordingNetwork>) {
    let indexer = RecordingIndexer::new("balance");
    let network = RecordingNetwork::new();
    let state = Arc::new(AppState::with_collaborators(
        common::test_config(),
        RecordingSurface::new(),
        RecordingBadge::new(),
        network.clone(),
        vec![indexer.clone()],
    ));
    (state, indexer, network)
}

/// 并发唤醒全部落在同一次在途转换上，索引器只启动一次
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_wakeups_single_fanout() {
    let (state, indexer, _network) = app_with_indexer();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move { state.lifecycle.wakeup(true).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(state.lifecycle.state(), LifecycleState::StartedFull);
    assert_eq!(indexer.starts.load(Ordering::SeqCst), 1);
}

/// 休眠/唤醒往返：链连接暂停恢复、索引器启停
#[tokio::test]
async fn test_sleep_wake_roundtrip() {
    let (state, indexer, network) = app_with_indexer();

    state.lifecycle.wakeup(true).await;
    assert_eq!(state.lifecycle.state(), LifecycleState::StartedFull);
    assert!(state.lifecycle.is_active());

    state.lifecycle.sleep().await;
    assert_eq!(state.lifecycle.state(), LifecycleState::Stopped);
    assert!(!state.lifecycle.is_active());
    assert_eq!(network.pauses.load(Ordering::SeqCst), 1);
    assert_eq!(indexer.stops.load(Ordering::SeqCst), 1);

    // 从STOPPED唤醒会恢复链连接
    state.lifecycle.wakeup(true).await;
    assert_eq!(network.resumes.load(Ordering::SeqCst), 1);
    assert_eq!(indexer.starts.load(Ordering::SeqCst), 2);
}

/// 休眠时订阅执行器清空全部存活订阅
#[tokio::test]
async fn test_sleep_clears_subscriptions() {
    let (state, _indexer, _network) = app_with_indexer();
    state.lifecycle.wakeup(true).await;

    let torn = Arc::new(AtomicUsize::new(0));
    for i in 0..3 {
        let torn = torn.clone();
        state.subscriptions.subscribe(
            format!("query-{}", i),
            Box::new(move || {
                torn.fetch_add(1, Ordering::SeqCst);
            }),
        );
    }
    assert_eq!(state.subscriptions.len(), 3);

    state.lifecycle.sleep().await;
    assert_eq!(torn.load(Ordering::SeqCst), 3);
    assert!(state.subscriptions.is_empty());
}

/// 重复休眠是无害的：第二次直接返回
#[tokio::test]
async fn test_repeated_sleep_is_idempotent() {
    let (state, indexer, network) = app_with_indexer();
    state.lifecycle.wakeup(true).await;

    state.lifecycle.sleep().await;
    state.lifecycle.sleep().await;

    assert_eq!(state.lifecycle.state(), LifecycleState::Stopped);
    assert_eq!(network.pauses.load(Ordering::SeqCst), 1);
    assert_eq!(indexer.stops.load(Ordering::SeqCst), 1);
}

/// 基础唤醒不触碰依赖子系统，完整唤醒补齐第二阶段
#[tokio::test]
async fn test_two_phase_wakeup() {
    let (state, indexer, _network) = app_with_indexer();

    state.lifecycle.wakeup(false).await;
    assert_eq!(state.lifecycle.state(), LifecycleState::Started);
    assert_eq!(indexer.starts.load(Ordering::SeqCst), 0);

    state.lifecycle.wakeup(true).await;
    assert_eq!(state.lifecycle.state(), LifecycleState::StartedFull);
    assert_eq!(indexer.starts.load(Ordering::SeqCst), 1);
}
