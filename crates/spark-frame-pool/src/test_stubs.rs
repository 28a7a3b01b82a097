//! 官方维护的日志桩对象，供集成测试、基准与示例复用。
//!
//! # 设计背景（Why）
//! - 统一维护常见桩对象，避免在各处重复定义空实现或录制器；
//! - 当 [`Logger`] 契约演进时，通过单点更新保证所有测试同步适配。

use std::sync::{Mutex, PoisonError};

use crate::observability::{LogRecord, LogSeverity, Logger};

/// `NoopLogger` 吞掉全部日志，对应“诊断关闭”的配置。
///
/// # 契约约束（What）
/// - `enabled` 永远返回 `false`，调用方因此不会格式化任何消息；
/// - 不分配内存，也不会阻塞线程。
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _record: &LogRecord<'_>) {}

    fn enabled(&self, _severity: LogSeverity) -> bool {
        false
    }
}

/// 一条被录制下来的日志。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLog {
    pub severity: LogSeverity,
    pub category: String,
    pub message: String,
}

/// 将日志格式化后保存在内存中，便于断言缓冲池输出了哪些诊断。
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<RecordedLog>>,
}

impl RecordingLogger {
    /// 返回全部记录的副本。
    pub fn records(&self) -> Vec<RecordedLog> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 仅返回消息文本，按提交顺序排列。
    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.message).collect()
    }

    /// 统计某个级别的记录条数。
    pub fn count(&self, severity: LogSeverity) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Logger for RecordingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        let entry = RecordedLog {
            severity: record.severity(),
            category: record.category().to_owned(),
            message: record.message().to_string(),
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}
