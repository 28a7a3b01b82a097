//! 缓冲池配置。
//!
//! # 教案式说明
//! - **意图（Why）**：预分配节点数、单块容量与诊断级别随部署场景变化（不同分辨率、帧率），
//!   以声明式配置注入，避免硬编码常量；
//! - **逻辑（How）**：`PoolConfig` 派生 `serde`，可从 TOML 片段解析，缺省字段回落到 [`Default`]；
//!   解析后统一经过 [`PoolConfig::validate`]；
//! - **契约（What）**：未知字段视为错误，防止拼写错误被静默忽略。

use serde::{Deserialize, Serialize};

use crate::{
    error::{PoolError, Result},
    observability::LogSeverity,
};

/// 默认预分配的空闲节点数量。
pub const DEFAULT_PREALLOCATED_NODES: usize = 3;

/// 默认日志分类标签。
pub const DEFAULT_LOG_CATEGORY: &str = "spark.frame_pool";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// 构造时放入空闲队列的节点数。
    pub preallocated_nodes: usize,
    /// 每个预分配节点预留的字节容量。
    pub block_capacity: usize,
    /// 日志过滤器的初始最低级别。
    pub min_log_severity: LogSeverity,
    /// 附加在每条日志上的分类标签。
    pub log_category: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            preallocated_nodes: DEFAULT_PREALLOCATED_NODES,
            block_capacity: 0,
            min_log_severity: LogSeverity::Debug,
            log_category: DEFAULT_LOG_CATEGORY.to_owned(),
        }
    }
}

impl PoolConfig {
    /// 解析 TOML 文本并校验。
    ///
    /// ```
    /// use spark_frame_pool::{LogSeverity, PoolConfig};
    ///
    /// let config = PoolConfig::from_toml_str(
    ///     "preallocated_nodes = 8\nblock_capacity = 4096\nmin_log_severity = \"warn\"",
    /// )
    /// .expect("合法配置");
    /// assert_eq!(config.preallocated_nodes, 8);
    /// assert_eq!(config.min_log_severity, LogSeverity::Warn);
    /// assert_eq!(config.log_category, "spark.frame_pool");
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PoolConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.log_category.trim().is_empty() {
            return Err(PoolError::InvalidConfig(
                "log_category must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn with_preallocated_nodes(mut self, count: usize) -> Self {
        self.preallocated_nodes = count;
        self
    }

    pub fn with_block_capacity(mut self, capacity: usize) -> Self {
        self.block_capacity = capacity;
        self
    }

    pub fn with_min_log_severity(mut self, severity: LogSeverity) -> Self {
        self.min_log_severity = severity;
        self
    }

    pub fn with_log_category(mut self, category: impl Into<String>) -> Self {
        self.log_category = category.into();
        self
    }
}
