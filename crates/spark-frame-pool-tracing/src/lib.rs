//! `spark-frame-pool-tracing` 把缓冲池的 [`Logger`] 契约桥接到 `tracing` 生态。
//!
//! # 教案式说明
//! - **意图（Why）**：缓冲池只依赖注入的日志接口；宿主若已使用 `tracing`，只需注入
//!   [`TracingLogger`]，再调用一次 [`install`] 即可获得带级别过滤的控制台输出。
//! - **逻辑（How）**：级别一一映射到 `tracing::Level`，`Fatal` 没有对应级别，以 `ERROR` 输出并附带
//!   `fatal = true` 字段；分类标签作为 `category` 字段保留。事件的 target 为本 crate 名
//!   `spark_frame_pool_tracing`，`EnvFilter` 指令应据此书写。
//! - **契约（What）**：`enabled` 询问当前 Subscriber 是否关心该级别，未启用时缓冲池不会格式化消息。

use std::sync::{Arc, OnceLock};

use spark_frame_pool::{LogRecord, LogSeverity, Logger};
use thiserror::Error;
use tracing::{Level, dispatcher};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

/// 默认过滤指令：`RUST_LOG` 未设置时只输出缓冲池的 info 及以上日志。
pub const DEFAULT_DIRECTIVES: &str = "spark_frame_pool_tracing=info";

static INSTALLED: OnceLock<()> = OnceLock::new();

/// 以 `tracing` 事件输出缓冲池日志的 [`Logger`] 实现。
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl TracingLogger {
    /// 便于直接注入 `QueueProcess` 的共享句柄。
    pub fn shared() -> Arc<dyn Logger> {
        Arc::new(TracingLogger)
    }
}

impl Logger for TracingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        let category = record.category();
        let message = record.message();
        match record.severity() {
            LogSeverity::Debug => tracing::debug!(category, "{message}"),
            LogSeverity::Info => tracing::info!(category, "{message}"),
            LogSeverity::Warn => tracing::warn!(category, "{message}"),
            LogSeverity::Error => tracing::error!(category, "{message}"),
            LogSeverity::Fatal => tracing::error!(category, fatal = true, "{message}"),
        }
    }

    fn enabled(&self, severity: LogSeverity) -> bool {
        match severity {
            LogSeverity::Debug => tracing::enabled!(Level::DEBUG),
            LogSeverity::Info => tracing::enabled!(Level::INFO),
            LogSeverity::Warn => tracing::enabled!(Level::WARN),
            LogSeverity::Error | LogSeverity::Fatal => tracing::enabled!(Level::ERROR),
        }
    }
}

/// 安装过程可能出现的错误。
#[derive(Debug, Error)]
pub enum InstallError {
    /// [`install`] 被重复调用。
    #[error("spark-frame-pool-tracing is already installed")]
    AlreadyInstalled,
    /// 外部已设置全局 Subscriber，无法覆盖。
    #[error("a global tracing subscriber has already been set")]
    SubscriberAlreadySet,
    /// 过滤指令无法解析。
    #[error("invalid filter directives")]
    InvalidDirectives(#[from] tracing_subscriber::filter::ParseError),
    /// 设置全局 Subscriber 失败。
    #[error("failed to set the global tracing subscriber")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// 安装全局 `fmt` Subscriber。
///
/// # 教案式说明
/// - **逻辑（How）**：
///   1. 拒绝重复安装，或外部已提前设置的 Subscriber；
///   2. 优先读取 `RUST_LOG`，未设置或无法解析时使用 `default_directives`；
///   3. 组装 `EnvFilter + fmt` 层并设置为全局默认。
/// - **契约（What）**：成功后进程内所有 [`TracingLogger`] 输出立即生效；
///   第二次调用返回 [`InstallError::AlreadyInstalled`]。
pub fn install(default_directives: &str) -> Result<(), InstallError> {
    if INSTALLED.get().is_some() {
        return Err(InstallError::AlreadyInstalled);
    }
    if dispatcher::has_been_set() {
        return Err(InstallError::SubscriberAlreadySet);
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives)?,
    };
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;

    INSTALLED
        .set(())
        .map_err(|_| InstallError::AlreadyInstalled)
}

#[cfg(test)]
mod tests {
    use spark_frame_pool::{PoolConfig, QueueProcess};
    use tracing_test::traced_test;

    use super::*;

    #[traced_test]
    #[test]
    fn severities_map_onto_tracing_levels() {
        let logger = TracingLogger;
        assert!(logger.enabled(LogSeverity::Debug));

        logger.warn("capture", format_args!("dropped {} frames", 3));
        logger.fatal("capture", format_args!("encoder lost"));

        assert!(logs_contain("dropped 3 frames"));
        assert!(logs_contain("WARN"));
        assert!(logs_contain("encoder lost"));
        assert!(logs_contain("fatal=true"));
    }

    #[traced_test]
    #[test]
    fn queue_process_diagnostics_reach_tracing() {
        let pool = QueueProcess::with_config(
            PoolConfig::default().with_preallocated_nodes(1),
            TracingLogger::shared(),
        )
        .expect("构造缓冲池");
        let node = pool.acquire_free(16).expect("领取节点");
        pool.enqueue_work(node).expect("投递");

        assert!(logs_contain("initialised with 1 free nodes"));
        assert!(logs_contain("work queue enqueue"));
        assert!(logs_contain("spark.frame_pool"));
    }
}
