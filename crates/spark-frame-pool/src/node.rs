use core::fmt;

use bytes::{Bytes, BytesMut};

use crate::error::{PoolError, Result};

/// 缓冲池实例的进程内标识，用于识别节点归属。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u64);

impl PoolId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `QueueNode` 是池化的最小单元：一块数据缓冲加上大小与序号元数据。
///
/// # 设计动机（Why）
/// - 采集线程每帧都要搬运一块定长数据，若每帧分配/释放一次堆内存，会在延迟敏感的流水线上
///   造成明显抖动；节点在工作队列与空闲队列之间循环，缓冲容量随节点一起被复用。
///
/// # 结构设计（How）
/// - `data`：独占的 `BytesMut`，长度即节点的有效字节数（`size`）；
/// - `index`：生产者写入的序号，语义由调用方定义，回收后不保证唯一；
/// - `origin`：创建或首次接收该节点的缓冲池，用于拒绝跨池投递。
///
/// # 契约说明（What）
/// - 节点不含链接字段，“是否在队列中”由所有权决定：持有 `QueueNode` 值即表示它已脱离任何队列；
/// - 节点被丢弃即释放其缓冲，不存在重复释放或悬垂引用。
pub struct QueueNode {
    data: BytesMut,
    index: i64,
    origin: Option<PoolId>,
}

impl QueueNode {
    /// 创建一个不预留容量、不归属任何缓冲池的空节点。
    pub fn new() -> Self {
        Self {
            data: BytesMut::new(),
            index: 0,
            origin: None,
        }
    }

    /// 创建预留 `capacity` 字节的空节点；内存不足时返回 [`PoolError::AllocationFailed`]。
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            data: try_alloc(capacity)?,
            index: 0,
            origin: None,
        })
    }

    pub(crate) fn with_origin(capacity: usize, origin: PoolId) -> Result<Self> {
        let mut node = Self::with_capacity(capacity)?;
        node.origin = Some(origin);
        Ok(node)
    }

    /// 有效字节数。
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 已分配的缓冲容量，回收后保持不变。
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn set_index(&mut self, index: i64) {
        self.index = index;
    }

    /// 创建或首次接收该节点的缓冲池；独立创建且尚未入队的节点返回 `None`。
    pub fn origin(&self) -> Option<PoolId> {
        self.origin
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 直接访问底层缓冲，生产者可借助 `bytes::BufMut` 原地写入。
    pub fn data_mut(&mut self) -> &mut BytesMut {
        &mut self.data
    }

    /// 用 `block` 覆盖节点内容，`size()` 随之等于 `block.len()`。
    ///
    /// # 契约说明（What）
    /// - 容量不足时以可失败的方式扩容，失败返回 [`PoolError::AllocationFailed`]，节点内容此时已被清空；
    /// - 容量足够时不会触发任何分配。
    pub fn fill(&mut self, block: &[u8]) -> Result<()> {
        self.data.clear();
        self.reserve_exact(block.len())?;
        self.data.extend_from_slice(block);
        Ok(())
    }

    /// 确保缓冲容量至少为 `min_capacity`，保留已有内容。
    pub fn reserve_exact(&mut self, min_capacity: usize) -> Result<()> {
        if self.data.capacity() >= min_capacity {
            return Ok(());
        }
        let mut grown = try_alloc(min_capacity.max(self.data.len()))?;
        grown.extend_from_slice(&self.data);
        self.data = grown;
        Ok(())
    }

    /// 清空内容与序号，容量保持不变，使节点看起来与新建节点一致。
    pub(crate) fn recycle(&mut self) {
        self.data.clear();
        self.index = 0;
    }

    pub(crate) fn adopt(&mut self, pool: PoolId) -> core::result::Result<(), PoolId> {
        match self.origin {
            Some(origin) if origin != pool => Err(origin),
            Some(_) => Ok(()),
            None => {
                self.origin = Some(pool);
                Ok(())
            }
        }
    }
}

impl Default for QueueNode {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueueNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueNode")
            .field("size", &self.size())
            .field("capacity", &self.capacity())
            .field("index", &self.index)
            .field("origin", &self.origin)
            .finish()
    }
}

/// 可失败地申请一块容量恰为 `capacity` 的缓冲。
fn try_alloc(capacity: usize) -> Result<BytesMut> {
    let mut raw: Vec<u8> = Vec::new();
    raw.try_reserve_exact(capacity)
        .map_err(|_| PoolError::AllocationFailed {
            requested: capacity,
        })?;
    Ok(BytesMut::from(Bytes::from(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_tracks_size_and_keeps_capacity_on_recycle() {
        let mut node = QueueNode::with_capacity(64).expect("分配 64 字节节点");
        node.fill(&[1, 2, 3]).expect("写入样本");
        node.set_index(42);
        assert_eq!(node.size(), 3);
        assert_eq!(node.data(), &[1, 2, 3]);
        assert!(node.capacity() >= 64);

        node.recycle();
        assert!(node.is_empty());
        assert_eq!(node.index(), 0);
        assert!(node.capacity() >= 64, "回收不应释放容量");
    }

    #[test]
    fn fill_grows_small_buffers() {
        let mut node = QueueNode::new();
        node.fill(&[7u8; 300]).expect("扩容写入");
        assert_eq!(node.size(), 300);
        assert!(node.capacity() >= 300);
    }

    #[test]
    fn with_capacity_reserves_requested_bytes() {
        for requested in [0, 1, 4096] {
            let node = QueueNode::with_capacity(requested).expect("分配节点");
            assert!(node.capacity() >= requested);
            assert!(node.is_empty());
        }
    }

    #[test]
    fn oversized_allocation_is_reported() {
        let err = QueueNode::with_capacity(usize::MAX).expect_err("不可能满足的容量");
        assert!(matches!(
            err,
            PoolError::AllocationFailed {
                requested: usize::MAX
            }
        ));
    }

    #[test]
    fn adopt_rejects_other_pools() {
        let mut node = QueueNode::new();
        assert!(node.adopt(PoolId::new(1)).is_ok());
        assert!(node.adopt(PoolId::new(1)).is_ok());
        assert_eq!(node.adopt(PoolId::new(2)), Err(PoolId::new(1)));
    }
}
