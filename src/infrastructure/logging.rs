//! 日志系统配置模块
//! 支持结构化日志、日志级别配置和日志轮转

use std::path::Path;

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;

/// 初始化日志系统
/// 返回的guard必须存活到进程退出，否则文件日志会丢尾部
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    // 设置日志级别过滤器
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if !config.enable_file_logging {
        // 仅控制台日志
        if config.format == "json" {
            Registry::default()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        } else {
            Registry::default()
                .with(filter)
                .with(fmt::layer().with_ansi(true))
                .init();
        }
        return Ok(None);
    }

    // 文件日志 + 控制台日志
    let log_dir = config
        .log_file_path
        .as_ref()
        .and_then(|p| Path::new(p).parent().map(Path::to_path_buf))
        .unwrap_or_else(|| Path::new("./logs").to_path_buf());

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "walletcore.log");
    let (non_blocking_appender, guard) = non_blocking(file_appender);

    if config.format == "json" {
        let file_layer = fmt::layer().json().with_writer(non_blocking_appender);
        let stdout_layer = fmt::layer().json();
        Registry::default()
            .with(filter)
            .with(file_layer)
            .with(stdout_layer)
            .init();
    } else {
        let file_layer = fmt::layer()
            .with_writer(non_blocking_appender)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_ansi(true);
        Registry::default()
            .with(filter)
            .with(file_layer)
            .with(stdout_layer)
            .init();
    }

    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_logging_config_defaults_to_console() {
        let config = crate::config::LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
            enable_file_logging: false,
            log_file_path: None,
        };
        // 只验证配置形状，全局subscriber初始化在测试进程中不可重复执行
        assert_eq!(config.format, "json");
        assert!(!config.enable_file_logging);
    }
}
