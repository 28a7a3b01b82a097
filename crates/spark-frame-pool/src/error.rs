//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为缓冲池对外暴露的失败语义提供集中定义：分配失败、跨池误用、锁中毒与配置错误；
//! - 空队列出队不是错误，它以 `Ok(None)` 表达，调用方据此选择“稍后重试”或“重新分配”。
//!
//! ## 设计要求（What）
//! - 所有变体派生 [`thiserror::Error`]，可直接交给 `anyhow` 等上层框架处理；
//! - 每个变体映射到 [`codes`] 中的稳定错误码，便于日志检索与告警聚合。

use thiserror::Error;

use crate::queue::QueueKind;

/// 缓冲池的稳定错误码集合，遵循 `<领域>.<语义>` 命名约定。
pub mod codes {
    /// 新建节点时无法获得所需内存。
    pub const ALLOCATION_FAILED: &str = "pool.allocation_failed";
    /// 节点由另一个缓冲池创建，却被投递到当前池。
    pub const FOREIGN_NODE: &str = "pool.foreign_node";
    /// 队列互斥锁因持锁线程 panic 而中毒。
    pub const LOCK_POISONED: &str = "pool.lock_poisoned";
    /// 配置项取值非法。
    pub const INVALID_CONFIG: &str = "pool.invalid_config";
    /// 配置文本无法解析。
    pub const CONFIG_PARSE: &str = "pool.config_parse";
}

/// 缓冲池错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：节点所有权在 Rust 中随值移动，“重复入队”“释放仍在队列中的节点”无法被表达；
///   剩余的契约违规与资源失败在这里显式化，避免静默破坏队列结构。
/// - **契约 (What)**：
///   - 所有变体满足 `Send + Sync + 'static`，可安全跨线程传播；
///   - [`code`](Self::code) 返回稳定错误码，不随消息文案变化。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// 申请 `requested` 字节的节点缓冲失败。
    #[error("failed to allocate a {requested}-byte frame buffer")]
    AllocationFailed { requested: usize },

    /// 节点来自池 `origin`，不能投递到池 `pool` 的 `queue` 队列。
    #[error("node created by pool #{origin} cannot be enqueued on {queue} queue of pool #{pool}")]
    ForeignNode {
        origin: u64,
        pool: u64,
        queue: QueueKind,
    },

    /// 持有 `queue` 队列锁的线程曾发生 panic。
    #[error("{queue} queue lock is poisoned")]
    LockPoisoned { queue: QueueKind },

    /// 配置校验失败。
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// TOML 配置解析失败。
    #[error("failed to parse pool configuration")]
    ConfigParse(#[from] toml::de::Error),
}

impl PoolError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            PoolError::AllocationFailed { .. } => codes::ALLOCATION_FAILED,
            PoolError::ForeignNode { .. } => codes::FOREIGN_NODE,
            PoolError::LockPoisoned { .. } => codes::LOCK_POISONED,
            PoolError::InvalidConfig(_) => codes::INVALID_CONFIG,
            PoolError::ConfigParse(_) => codes::CONFIG_PARSE,
        }
    }
}

/// 缓冲池统一结果类型。
pub type Result<T, E = PoolError> = core::result::Result<T, E>;
