//! WalletCore 主入口
//! 多链钱包后台编排核心守护进程

use std::sync::Arc;

use anyhow::Result;
use walletcore::{api, app_state::AppState, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();

    // 2. 加载配置（存在CONFIG_PATH时以文件为准）
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate()?;
    let config = Arc::new(config);

    // 3. 初始化日志
    let _log_guard = walletcore::infrastructure::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    tracing::info!("Starting WalletCore orchestration service");

    // 4. 装配编排核心
    let state = Arc::new(AppState::new(config.clone()));

    // 5. 唤醒钱包
    state
        .lifecycle
        .wakeup(config.lifecycle.full_wakeup_on_boot)
        .await;
    tracing::info!(
        state = state.lifecycle.state().as_str(),
        "wallet core awake"
    );

    // 6. 启动HTTP服务
    let router = api::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!("Listening on {}", config.server.bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await?;

    Ok(())
}

/// Ctrl-C 后先休眠钱包再退出，保证子系统按依赖顺序停止
async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received, putting wallet core to sleep");
    state.lifecycle.sleep().await;
}
