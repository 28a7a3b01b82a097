//! 缓冲池的诊断日志契约。
//!
//! # 教案式说明
//! - **意图（Why）**：缓冲池只“调用”日志，不“拥有”日志后端；宿主通过 [`Logger`] 注入实现，
//!   可以是 `tracing` 桥接、测试录制器，或在关闭诊断时使用空实现。
//! - **逻辑（How）**：[`LogRecord`] 以 [`fmt::Arguments`] 延迟格式化，配合 [`Logger::enabled`]
//!   与 [`SeverityFilter`] 的运行时阈值，被过滤的记录不会产生任何格式化或分配开销。
//! - **契约（What）**：日志调用永远不影响控制流；实现方不得在 `log` 中 panic 或阻塞过久。

use core::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU8, Ordering},
};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// 日志级别，按重要性升序排列。
///
/// # 契约说明（What）
/// - `Debug` 面向排障细节，`Info` 为常规生命周期事件，`Warn` 表示调用方误用等潜在风险，
///   `Error` 表示操作失败，`Fatal` 表示不可恢复的状态。
/// - 比较运算遵循声明顺序：`Debug < Info < Warn < Error < Fatal`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogSeverity {
    /// 小写名称，与配置文件中的取值一致。
    pub fn as_str(self) -> &'static str {
        match self {
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warn => "warn",
            LogSeverity::Error => "error",
            LogSeverity::Fatal => "fatal",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LogSeverity::Debug,
            1 => LogSeverity::Info,
            2 => LogSeverity::Warn,
            3 => LogSeverity::Error,
            _ => LogSeverity::Fatal,
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 解析未知级别名称时返回的错误。
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown log severity `{0}`")]
pub struct ParseSeverityError(String);

impl FromStr for LogSeverity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogSeverity::Debug),
            "info" => Ok(LogSeverity::Info),
            "warn" | "warning" => Ok(LogSeverity::Warn),
            "error" => Ok(LogSeverity::Error),
            "fatal" => Ok(LogSeverity::Fatal),
            _ => Err(ParseSeverityError(s.to_owned())),
        }
    }
}

/// 单条诊断记录：级别、分类标签与延迟格式化的消息。
///
/// # 契约说明（What）
/// - `category` 对应原始日志设施中的模块名，用于在汇聚端区分来源；
/// - `message` 只在真正输出时格式化；实现方若需异步输出，必须先调用 `to_string` 取得所有权。
#[derive(Clone, Copy, Debug)]
pub struct LogRecord<'a> {
    severity: LogSeverity,
    category: &'a str,
    message: fmt::Arguments<'a>,
}

impl<'a> LogRecord<'a> {
    pub fn new(severity: LogSeverity, category: &'a str, message: fmt::Arguments<'a>) -> Self {
        Self {
            severity,
            category,
            message,
        }
    }

    pub fn severity(&self) -> LogSeverity {
        self.severity
    }

    pub fn category(&self) -> &'a str {
        self.category
    }

    pub fn message(&self) -> fmt::Arguments<'a> {
        self.message
    }
}

impl fmt::Display for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

/// 日志接口的核心契约。
///
/// # 设计背景（Why）
/// - 替代进程级、编译期开关控制的日志宏：缓冲池把日志视为外部协作者，在构造时注入。
///
/// # 逻辑解析（How）
/// - `log` 为唯一必需方法；`enabled` 允许实现方提前声明是否关心某个级别，
///   调用方据此跳过格式化；
/// - `debug`/`info`/`warn`/`error`/`fatal` 便捷方法统一构造 [`LogRecord`] 后委派给 `log`。
///
/// # 契约说明（What）
/// - **前置条件**：实现必须线程安全（`Send + Sync + 'static`）；
/// - **后置条件**：实现应尽量非阻塞；缓冲池从不在持锁期间调用日志。
pub trait Logger: Send + Sync + 'static {
    /// 提交一条记录。
    fn log(&self, record: &LogRecord<'_>);

    /// 是否会输出该级别的记录，默认全部输出。
    fn enabled(&self, _severity: LogSeverity) -> bool {
        true
    }

    fn debug(&self, category: &str, message: fmt::Arguments<'_>) {
        self.emit(LogSeverity::Debug, category, message);
    }

    fn info(&self, category: &str, message: fmt::Arguments<'_>) {
        self.emit(LogSeverity::Info, category, message);
    }

    fn warn(&self, category: &str, message: fmt::Arguments<'_>) {
        self.emit(LogSeverity::Warn, category, message);
    }

    fn error(&self, category: &str, message: fmt::Arguments<'_>) {
        self.emit(LogSeverity::Error, category, message);
    }

    fn fatal(&self, category: &str, message: fmt::Arguments<'_>) {
        self.emit(LogSeverity::Fatal, category, message);
    }

    /// 检查 `enabled` 后提交记录，所有便捷方法共享此路径。
    fn emit(&self, severity: LogSeverity, category: &str, message: fmt::Arguments<'_>) {
        if self.enabled(severity) {
            self.log(&LogRecord::new(severity, category, message));
        }
    }
}

/// 按最低级别过滤记录的日志包装器，阈值可在运行期调整。
///
/// # 教案式说明
/// - **意图 (Why)**：原始实现在编译期选择日志级别；这里改为运行期阈值，
///   允许宿主在排障时临时打开 `Debug` 而无需重新构建。
/// - **逻辑 (How)**：阈值以 `AtomicU8` 存储，读写均使用 `Relaxed`，
///   阈值变化不需要与其它内存操作建立先后关系。
/// - **契约 (What)**：低于阈值的记录不会到达内层实现；`enabled` 同时尊重内层实现的判断。
pub struct SeverityFilter {
    inner: Arc<dyn Logger>,
    min_severity: AtomicU8,
}

impl SeverityFilter {
    pub fn new(inner: Arc<dyn Logger>, min_severity: LogSeverity) -> Self {
        Self {
            inner,
            min_severity: AtomicU8::new(min_severity as u8),
        }
    }

    /// 当前阈值。
    pub fn min_severity(&self) -> LogSeverity {
        LogSeverity::from_u8(self.min_severity.load(Ordering::Relaxed))
    }

    /// 调整阈值，立即对后续记录生效。
    pub fn set_min_severity(&self, severity: LogSeverity) {
        self.min_severity.store(severity as u8, Ordering::Relaxed);
    }
}

impl fmt::Debug for SeverityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeverityFilter")
            .field("min_severity", &self.min_severity())
            .finish_non_exhaustive()
    }
}

impl Logger for SeverityFilter {
    fn log(&self, record: &LogRecord<'_>) {
        if record.severity() >= self.min_severity() {
            self.inner.log(record);
        }
    }

    fn enabled(&self, severity: LogSeverity) -> bool {
        severity >= self.min_severity() && self.inner.enabled(severity)
    }
}
