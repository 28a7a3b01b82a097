use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};
use std::{
    collections::VecDeque,
    sync::{Arc, PoisonError},
};

// 教案级说明：`loom` 需要接管互斥锁以枚举调度交错，因此在模型检查配置下切换到
// `loom::sync::Mutex`；常规构建保留 `std::sync::Mutex`。进程级计数器不参与模型，
// 始终使用标准原子类型。
#[cfg(loom)]
use loom::sync::{Mutex, MutexGuard};
#[cfg(not(loom))]
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::{
    config::PoolConfig,
    error::{PoolError, Result},
    node::{PoolId, QueueNode},
    observability::{LogSeverity, Logger, SeverityFilter},
    queue::{Queue, QueueKind},
};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// 两个队列及其各自的互斥锁。
///
/// # 契约说明（What）
/// - 单队列操作只经由 [`lock`](Self::lock) 获取一把锁；
/// - [`lock_both`](Self::lock_both) 是唯一同时持有两把锁的入口，固定“先工作队列、后空闲队列”，
///   其它代码路径无法以相反顺序加锁，循环等待因此不可能出现。
struct QueuePair {
    work: Mutex<Queue>,
    free: Mutex<Queue>,
}

impl QueuePair {
    fn new(work: Queue, free: Queue) -> Self {
        Self {
            work: Mutex::new(work),
            free: Mutex::new(free),
        }
    }

    fn mutex(&self, kind: QueueKind) -> &Mutex<Queue> {
        match kind {
            QueueKind::Work => &self.work,
            QueueKind::Free => &self.free,
        }
    }

    fn lock(&self, kind: QueueKind) -> Result<MutexGuard<'_, Queue>> {
        self.mutex(kind)
            .lock()
            .map_err(|_| PoolError::LockPoisoned { queue: kind })
    }

    fn lock_both(&self) -> Result<(MutexGuard<'_, Queue>, MutexGuard<'_, Queue>)> {
        let work = self.lock(QueueKind::Work)?;
        let free = self.lock(QueueKind::Free)?;
        Ok((work, free))
    }

    /// 拆除阶段使用：忽略中毒标记，队列结构在任何临界区内都不会处于半更新状态。
    fn lock_ignoring_poison(&self, kind: QueueKind) -> MutexGuard<'_, Queue> {
        self.mutex(kind)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// 缓冲池运行指标的快照。
///
/// 两个队列的长度分别在各自的锁内读取，快照整体并非原子视图。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub work_len: usize,
    pub free_len: usize,
    /// 新建节点次数（含构造时的预分配）。
    pub fresh_allocations: u64,
    /// 节点被回收进空闲队列的次数。
    pub recycled_nodes: u64,
    /// 节点被真正释放的次数。
    pub released_nodes: u64,
    /// 分配失败次数。
    pub failed_allocations: u64,
}

#[derive(Default)]
struct PoolMetrics {
    fresh_allocations: AtomicU64,
    recycled_nodes: AtomicU64,
    released_nodes: AtomicU64,
    failed_allocations: AtomicU64,
}

impl PoolMetrics {
    fn add(counter: &AtomicU64, value: usize) {
        counter.fetch_add(value as u64, Ordering::Relaxed);
    }
}

/// `QueueProcess` 管理一对工作队列与空闲队列，在生产者与消费者线程之间循环复用节点。
///
/// # 模块角色（Why）
/// - 采集线程每帧领取一个空闲节点、写入样本后投递到工作队列；处理线程取出、处理后再把节点
///   放回空闲队列。节点与其缓冲在整个生命周期内反复使用，避免逐帧分配与释放；
/// - 诊断日志以注入方式接入，缓冲池自身不绑定任何日志后端。
///
/// # 核心机制（How）
/// - 两个队列各由一把互斥锁保护，临界区只包含节点所有权的转移，不做 I/O、分配或日志；
/// - 仅 [`reset_free_queue`](Self::reset_free_queue) 同时持有两把锁，且只能经由内部的
///   `QueuePair::lock_both` 以固定顺序获取；
/// - 运行指标以 `Relaxed` 原子计数累积，支撑 [`stats`](Self::stats) 快照。
///
/// # 契约说明（What）
/// - **线程安全**：`QueueProcess: Send + Sync`，通常以 `Arc` 共享给各线程；
/// - **非阻塞**：空队列出队立即返回 `Ok(None)`，需要阻塞语义的调用方自行轮询或借助外部唤醒；
/// - **无背压**：队列长度只受可用内存限制；
/// - **生命周期**：`Drop` 时两个队列中剩余的节点全部释放，不泄漏、不重复释放。
pub struct QueueProcess {
    id: PoolId,
    queues: QueuePair,
    logger: SeverityFilter,
    category: String,
    metrics: PoolMetrics,
}

impl QueueProcess {
    /// 以默认配置创建缓冲池。
    pub fn new(logger: Arc<dyn Logger>) -> Result<Self> {
        Self::with_config(PoolConfig::default(), logger)
    }

    /// 按配置创建缓冲池：两个队列初始化为空，随后向空闲队列预分配
    /// `preallocated_nodes` 个容量为 `block_capacity` 的节点。
    ///
    /// # 契约说明（What）
    /// - 配置非法返回 [`PoolError::InvalidConfig`]；
    /// - 任一预分配失败返回 [`PoolError::AllocationFailed`]，已分配的节点随之释放。
    pub fn with_config(config: PoolConfig, logger: Arc<dyn Logger>) -> Result<Self> {
        config.validate()?;
        let id = PoolId::new(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed));
        let logger = SeverityFilter::new(logger, config.min_log_severity);
        let metrics = PoolMetrics::default();

        let mut free = Queue::new(QueueKind::Free);
        for _ in 0..config.preallocated_nodes {
            match QueueNode::with_origin(config.block_capacity, id) {
                Ok(node) => free.push_back(node),
                Err(err) => {
                    logger.error(
                        &config.log_category,
                        format_args!("pool {id} failed to preallocate free nodes: {err}"),
                    );
                    return Err(err);
                }
            }
        }
        PoolMetrics::add(&metrics.fresh_allocations, free.len());

        let process = Self {
            id,
            queues: QueuePair::new(Queue::new(QueueKind::Work), free),
            logger,
            category: config.log_category,
            metrics,
        };
        process.logger.info(
            &process.category,
            format_args!(
                "pool {id} initialised with {} free nodes of {} bytes",
                config.preallocated_nodes, config.block_capacity
            ),
        );
        Ok(process)
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn min_log_severity(&self) -> LogSeverity {
        self.logger.min_severity()
    }

    /// 运行期调整日志阈值。
    pub fn set_min_log_severity(&self, severity: LogSeverity) {
        self.logger.set_min_severity(severity);
    }

    /// 将节点追加到 `kind` 队列尾部，节点所有权随之转入队列。
    ///
    /// # 契约说明（What）
    /// - 节点由其它缓冲池创建时返回 [`PoolError::ForeignNode`]；
    /// - 队列锁已中毒时返回 [`PoolError::LockPoisoned`]；
    /// - 以上两种情况下节点都经由 [`free_node`](Self::free_node) 释放并计入本池的释放计数；
    /// - 独立创建的节点在首次入队时归属当前缓冲池。
    pub fn enqueue(&self, kind: QueueKind, mut node: QueueNode) -> Result<()> {
        if let Err(origin) = node.adopt(self.id) {
            let err = PoolError::ForeignNode {
                origin: origin.get(),
                pool: self.id.get(),
                queue: kind,
            };
            self.report(&err);
            self.free_node(node);
            return Err(err);
        }

        let (index, len) = {
            let mut queue = match self.lock(kind) {
                Ok(queue) => queue,
                Err(err) => {
                    self.free_node(node);
                    return Err(err);
                }
            };
            let index = node.index();
            queue.push_back(node);
            (index, queue.len())
        };
        self.logger.debug(
            &self.category,
            format_args!("{kind} queue enqueue, index: {index}, size: {len}"),
        );
        Ok(())
    }

    pub fn enqueue_work(&self, node: QueueNode) -> Result<()> {
        self.enqueue(QueueKind::Work, node)
    }

    pub fn enqueue_free(&self, node: QueueNode) -> Result<()> {
        self.enqueue(QueueKind::Free, node)
    }

    /// 摘除 `kind` 队列的队首节点。
    ///
    /// 队列为空时返回 `Ok(None)`，这是正常情况而非错误。返回的节点在释放锁之前已完全脱离队列。
    pub fn dequeue(&self, kind: QueueKind) -> Result<Option<QueueNode>> {
        let (node, len) = {
            let mut queue = self.lock(kind)?;
            let node = queue.pop_front();
            (node, queue.len())
        };
        match &node {
            Some(node) => self.logger.debug(
                &self.category,
                format_args!("{kind} queue dequeue, index: {}, size: {len}", node.index()),
            ),
            None => self
                .logger
                .debug(&self.category, format_args!("{kind} queue is empty")),
        }
        Ok(node)
    }

    pub fn dequeue_work(&self) -> Result<Option<QueueNode>> {
        self.dequeue(QueueKind::Work)
    }

    pub fn dequeue_free(&self) -> Result<Option<QueueNode>> {
        self.dequeue(QueueKind::Free)
    }

    /// 释放节点的缓冲与节点本身。
    ///
    /// 缓冲池内部的所有释放路径（清空、拆除、拒收）都汇聚到这里，`released_nodes`
    /// 计数与逐节点的调试日志因此保持一致。调用时不得持有任何队列锁。
    pub fn free_node(&self, node: QueueNode) {
        let (index, capacity) = (node.index(), node.capacity());
        drop(node);
        PoolMetrics::add(&self.metrics.released_nodes, 1);
        self.logger.debug(
            &self.category,
            format_args!("released node, index: {index}, capacity: {capacity}"),
        );
    }

    /// 生产者领取节点：优先复用空闲队列中的节点，空闲队列为空时新建。
    ///
    /// # 契约说明（What）
    /// - 返回的节点内容为空、`index` 为 0，容量至少为 `min_capacity`；
    /// - 复用节点扩容失败时，节点被放回空闲队列并返回 [`PoolError::AllocationFailed`]；
    ///   若放回时空闲队列锁已中毒，两个错误都会记录日志，返回值仍是分配错误。
    pub fn acquire_free(&self, min_capacity: usize) -> Result<QueueNode> {
        let Some(mut node) = self.dequeue(QueueKind::Free)? else {
            return self.allocate_node(min_capacity);
        };
        node.recycle();
        if let Err(err) = node.reserve_exact(min_capacity) {
            PoolMetrics::add(&self.metrics.failed_allocations, 1);
            self.report(&err);
            // 放回失败已由 `enqueue` 记录，节点随之释放。
            let _ = self.enqueue(QueueKind::Free, node);
            return Err(err);
        }
        Ok(node)
    }

    /// 新建一个归属当前缓冲池、容量为 `capacity` 的节点。
    pub fn allocate_node(&self, capacity: usize) -> Result<QueueNode> {
        match QueueNode::with_origin(capacity, self.id) {
            Ok(node) => {
                PoolMetrics::add(&self.metrics.fresh_allocations, 1);
                self.logger.debug(
                    &self.category,
                    format_args!("allocated fresh node, capacity: {capacity}"),
                );
                Ok(node)
            }
            Err(err) => {
                PoolMetrics::add(&self.metrics.failed_allocations, 1);
                self.report(&err);
                Err(err)
            }
        }
    }

    /// 消费者归还节点：清空内容后放回空闲队列，缓冲容量保留。
    pub fn recycle(&self, mut node: QueueNode) -> Result<()> {
        node.recycle();
        self.enqueue(QueueKind::Free, node)?;
        PoolMetrics::add(&self.metrics.recycled_nodes, 1);
        Ok(())
    }

    /// 将工作队列中的全部节点按原顺序转移到空闲队列尾部。
    ///
    /// # 契约说明（What）
    /// - 转移期间同时持有两把锁（先工作队列、后空闲队列），其它线程看不到中间状态；
    /// - 节点内容被清空但缓冲不释放；
    /// - 返回转移的节点数，空闲队列长度恰好增加该数值，工作队列随后为空。
    pub fn reset_free_queue(&self) -> Result<usize> {
        let (moved, free_len) = {
            let (mut work, mut free) = self.lock_both()?;
            let moved = work.len();
            work.iter_mut().for_each(QueueNode::recycle);
            free.append(&mut work);
            (moved, free.len())
        };
        PoolMetrics::add(&self.metrics.recycled_nodes, moved);
        self.logger.debug(
            &self.category,
            format_args!("reset free queue, moved: {moved}, free size: {free_len}"),
        );
        Ok(moved)
    }

    /// 释放 `kind` 队列中的全部节点，返回释放数量。
    ///
    /// 节点在锁内整体摘除，逐个释放发生在解锁之后。
    pub fn clear_queue(&self, kind: QueueKind) -> Result<usize> {
        let detached = self.lock(kind)?.take_all();
        let released = self.release_all(detached);
        self.logger.debug(
            &self.category,
            format_args!("cleared {kind} queue, released: {released}"),
        );
        Ok(released)
    }

    pub fn len(&self, kind: QueueKind) -> Result<usize> {
        Ok(self.lock(kind)?.len())
    }

    pub fn is_empty(&self, kind: QueueKind) -> Result<bool> {
        Ok(self.lock(kind)?.is_empty())
    }

    pub fn stats(&self) -> Result<PoolStats> {
        let work_len = self.len(QueueKind::Work)?;
        let free_len = self.len(QueueKind::Free)?;
        Ok(PoolStats {
            work_len,
            free_len,
            fresh_allocations: self.metrics.fresh_allocations.load(Ordering::Relaxed),
            recycled_nodes: self.metrics.recycled_nodes.load(Ordering::Relaxed),
            released_nodes: self.metrics.released_nodes.load(Ordering::Relaxed),
            failed_allocations: self.metrics.failed_allocations.load(Ordering::Relaxed),
        })
    }

    fn release_all(&self, nodes: VecDeque<QueueNode>) -> usize {
        let released = nodes.len();
        nodes.into_iter().for_each(|node| self.free_node(node));
        released
    }

    fn lock(&self, kind: QueueKind) -> Result<MutexGuard<'_, Queue>> {
        self.queues.lock(kind).inspect_err(|err| self.report(err))
    }

    fn lock_both(&self) -> Result<(MutexGuard<'_, Queue>, MutexGuard<'_, Queue>)> {
        self.queues.lock_both().inspect_err(|err| self.report(err))
    }

    fn report(&self, err: &PoolError) {
        match err {
            PoolError::ForeignNode { .. } => self
                .logger
                .warn(&self.category, format_args!("{err} [{}]", err.code())),
            _ => self
                .logger
                .error(&self.category, format_args!("{err} [{}]", err.code())),
        }
    }
}

impl Drop for QueueProcess {
    fn drop(&mut self) {
        // 守卫在语句结束时释放，节点的释放发生在锁外。
        let work = self
            .queues
            .lock_ignoring_poison(QueueKind::Work)
            .init(QueueKind::Work);
        let free = self
            .queues
            .lock_ignoring_poison(QueueKind::Free)
            .init(QueueKind::Free);
        let work = self.release_all(work);
        let free = self.release_all(free);
        self.logger.info(
            &self.category,
            format_args!(
                "pool {} torn down, released {work} work and {free} free nodes",
                self.id
            ),
        );
    }
}

impl fmt::Debug for QueueProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueProcess")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::thread;

    use super::*;
    use crate::{error::codes, test_stubs::RecordingLogger};

    fn pool_with(logger: Arc<RecordingLogger>, preallocated: usize) -> QueueProcess {
        QueueProcess::with_config(
            PoolConfig::default().with_preallocated_nodes(preallocated),
            logger,
        )
        .expect("构造缓冲池")
    }

    #[test]
    fn construction_prefills_free_queue() {
        let pool = pool_with(Arc::new(RecordingLogger::default()), 3);
        let stats = pool.stats().expect("统计");
        assert_eq!(stats.free_len, 3);
        assert_eq!(stats.work_len, 0);
        assert_eq!(stats.fresh_allocations, 3);
    }

    #[test]
    fn foreign_nodes_are_rejected_with_warning() {
        let logger = Arc::new(RecordingLogger::default());
        let first = pool_with(logger.clone(), 1);
        let second = pool_with(logger.clone(), 0);

        let node = first.dequeue_free().expect("出队").expect("预分配节点");
        let err = second.enqueue_work(node).expect_err("跨池投递");
        assert_eq!(err.code(), codes::FOREIGN_NODE);
        assert_eq!(second.len(QueueKind::Work).expect("长度"), 0);
        assert_eq!(logger.count(LogSeverity::Warn), 1);
        assert_eq!(second.stats().expect("统计").released_nodes, 1, "拒收的节点计入释放");
        assert_eq!(first.stats().expect("统计").released_nodes, 0);
    }

    #[test]
    fn enqueue_into_poisoned_queue_releases_node() {
        let pool = Arc::new(pool_with(Arc::new(RecordingLogger::default()), 0));
        let poisoner = Arc::clone(&pool);
        let outcome = thread::spawn(move || {
            let _guard = poisoner.queues.work.lock().expect("首次加锁");
            panic!("持锁线程崩溃");
        })
        .join();
        assert!(outcome.is_err());

        let err = pool
            .enqueue_work(QueueNode::new())
            .expect_err("锁已中毒");
        assert_eq!(err.code(), codes::LOCK_POISONED);
        assert_eq!(pool.stats().expect_err("工作队列锁已中毒").code(), codes::LOCK_POISONED);
        assert_eq!(pool.metrics.released_nodes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn poisoned_lock_surfaces_as_error() {
        let pool = Arc::new(pool_with(Arc::new(RecordingLogger::default()), 0));
        let poisoner = Arc::clone(&pool);
        let outcome = thread::spawn(move || {
            let _guard = poisoner.queues.work.lock().expect("首次加锁");
            panic!("持锁线程崩溃");
        })
        .join();
        assert!(outcome.is_err());

        let err = pool.dequeue_work().expect_err("锁已中毒");
        assert!(matches!(
            err,
            PoolError::LockPoisoned {
                queue: QueueKind::Work
            }
        ));
        assert!(pool.dequeue_free().expect("空闲队列不受影响").is_none());
        let err = pool.reset_free_queue().expect_err("双锁路径同样报告中毒");
        assert_eq!(err.code(), codes::LOCK_POISONED);
    }

    #[test]
    fn drop_releases_every_remaining_node() {
        let logger = Arc::new(RecordingLogger::default());
        {
            let pool = pool_with(logger.clone(), 2);
            let node = pool.acquire_free(8).expect("领取");
            pool.enqueue_work(node).expect("投递");
        }
        let messages = logger.messages();
        let last = messages.last().expect("拆除日志");
        assert!(last.contains("released 1 work and 1 free nodes"), "{last}");
        let per_node = messages
            .iter()
            .filter(|message| message.contains("released node"))
            .count();
        assert_eq!(per_node, 2, "拆除时每个节点都经由统一的释放路径");
    }

    #[test]
    fn runtime_threshold_silences_debug_output() {
        let logger = Arc::new(RecordingLogger::default());
        let pool = pool_with(logger.clone(), 0);
        let before = logger.len();

        pool.set_min_log_severity(LogSeverity::Warn);
        assert_eq!(pool.min_log_severity(), LogSeverity::Warn);
        assert!(pool.dequeue_work().expect("出队").is_none());
        assert_eq!(logger.len(), before);
    }
}
