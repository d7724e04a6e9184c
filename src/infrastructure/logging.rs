//! 日志系统配置模块
//! 支持结构化日志、日志级别配置和按天轮转的文件日志
//!
//! 钱包事件只记录地址、路径、签名等公开字段，助记词与私钥类型的 `Debug` 均已脱敏。

use std::path::Path;

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::LoggingConfig;

const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_LOG_FILE: &str = "ironseed.log";

/// 初始化日志系统
///
/// 启用文件日志时返回 `WorkerGuard`，调用方需持有到进程退出，否则缓冲的日志会丢失。
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    // 设置日志级别过滤器
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let json = config.format == "json";

    if !config.enable_file_logging {
        let registry = Registry::default().with(filter);
        if json {
            registry
                .with(fmt::layer().json().with_timer(ChronoUtc::rfc_3339()))
                .try_init()?;
        } else {
            registry
                .with(fmt::layer().with_timer(ChronoUtc::rfc_3339()).with_ansi(true))
                .try_init()?;
        }
        return Ok(None);
    }

    let (log_dir, file_name) = log_file_location(config.log_file_path.as_deref());
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, file_name);
    let (non_blocking_appender, guard) = non_blocking(file_appender);

    if json {
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(non_blocking_appender)
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .with(fmt::layer().json().with_timer(ChronoUtc::rfc_3339()))
            .try_init()?;
    } else {
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(non_blocking_appender)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false),
            )
            .with(fmt::layer().with_timer(ChronoUtc::rfc_3339()).with_ansi(true))
            .try_init()?;
    }

    Ok(Some(guard))
}

/// 简化初始化（使用默认配置）
pub fn init_default_logging() -> Option<WorkerGuard> {
    let config = LoggingConfig::default();
    init_logging(&config).unwrap_or_else(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        None
    })
}

// 拆分日志文件路径；未配置时使用 ./logs/ironseed.log
fn log_file_location(path: Option<&str>) -> (&Path, &str) {
    let Some(path) = path.map(Path::new) else {
        return (Path::new(DEFAULT_LOG_DIR), DEFAULT_LOG_FILE);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new(DEFAULT_LOG_DIR));
    let file = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    (dir, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_location() {
        assert_eq!(
            log_file_location(None),
            (Path::new("./logs"), "ironseed.log")
        );
        assert_eq!(
            log_file_location(Some("/var/log/wallet/core.log")),
            (Path::new("/var/log/wallet"), "core.log")
        );
        assert_eq!(
            log_file_location(Some("core.log")),
            (Path::new("./logs"), "core.log")
        );
    }

    #[test]
    fn test_init_logging_console_only() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
            enable_file_logging: false,
            log_file_path: None,
        };

        // 全局订阅者只能设置一次，第二次调用返回错误而不是 panic
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
