#![deny(unsafe_code)]

//! `spark-frame-pool` 提供在生产者与消费者线程之间搬运定长数据块（如采集到的媒体帧）的双队列缓冲池。
//!
//! # 模块定位（Why）
//! - 采集回调每秒产生数十到数百个样本块，逐块分配与释放会在延迟敏感的流水线上引入抖动；
//! - 缓冲池让节点在“空闲队列”与“工作队列”之间循环，缓冲容量随节点一起被复用。
//!
//! # 设计概要（How）
//! - [`queue`]：不带同步的先进先出容器，以所有权转移表达“节点在哪个队列上”；
//! - [`process`]：[`QueueProcess`] 为两个队列各配一把锁，提供入队、出队、回收、重置与清空；
//! - [`observability`]：注入式日志契约与运行期级别过滤；
//! - [`config`]：可从 TOML 解析的 [`PoolConfig`]；
//! - [`test_stubs`]：测试与基准复用的日志桩。
//!
//! # 使用示例
//! ```
//! use std::sync::Arc;
//!
//! use spark_frame_pool::{QueueProcess, test_stubs::NoopLogger};
//!
//! let pool = QueueProcess::new(Arc::new(NoopLogger)).expect("构造缓冲池");
//!
//! // 生产者：领取空闲节点，写入样本后投递到工作队列。
//! let mut node = pool.acquire_free(4).expect("领取节点");
//! node.fill(&[1, 2, 3, 4]).expect("写入样本");
//! node.set_index(0);
//! pool.enqueue_work(node).expect("投递");
//!
//! // 消费者：取出处理后回收。
//! let node = pool.dequeue_work().expect("出队").expect("存在待处理节点");
//! assert_eq!(node.data(), &[1, 2, 3, 4]);
//! pool.recycle(node).expect("回收");
//! ```

pub mod config;
pub mod error;
pub mod node;
pub mod observability;
pub mod process;
pub mod queue;
pub mod test_stubs;

pub use config::PoolConfig;
pub use error::{PoolError, Result};
pub use node::{PoolId, QueueNode};
pub use observability::{LogRecord, LogSeverity, Logger, SeverityFilter};
pub use process::{PoolStats, QueueProcess};
pub use queue::{Queue, QueueKind};
