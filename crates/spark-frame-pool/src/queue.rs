use core::fmt;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::node::QueueNode;

/// 队列类型标签。
///
/// - `Work`：已填充数据、等待消费者处理的节点；
/// - `Free`：可复用的空节点，等待生产者领取。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    Work,
    Free,
}

impl QueueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueKind::Work => "work",
            QueueKind::Free => "free",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Queue` 是节点的先进先出容器，自身不做任何同步。
///
/// # 模块角色（Why）
/// - 作为 [`QueueProcess`](crate::QueueProcess) 的结构层，只负责“队尾追加、队首摘除”的链接关系；
///   加锁策略全部由上层决定。
///
/// # 核心机制（How）
/// - 内部以 `VecDeque<QueueNode>` 独占持有节点：入队即转移所有权，出队即交还所有权，
///   “节点同时挂在两个队列上”在类型层面无法表达；
/// - `front`/`rear` 对应队首与队尾，二者同时为空当且仅当 `len() == 0`。
///
/// # 契约说明（What）
/// - 出队顺序与入队顺序一致；
/// - `len()` 始终等于成功入队次数减去非空出队次数。
pub struct Queue {
    kind: QueueKind,
    nodes: VecDeque<QueueNode>,
}

impl Queue {
    /// 创建指定类型的空队列。
    pub fn new(kind: QueueKind) -> Self {
        Self {
            kind,
            nodes: VecDeque::new(),
        }
    }

    /// 将队列重置为 `kind` 类型的空队列，残留节点整体交还调用方释放。
    ///
    /// 幂等：对空队列重复调用没有任何副作用。
    pub fn init(&mut self, kind: QueueKind) -> VecDeque<QueueNode> {
        self.kind = kind;
        core::mem::take(&mut self.nodes)
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 队首节点，即下一次 [`pop_front`](Self::pop_front) 将返回的节点。
    pub fn front(&self) -> Option<&QueueNode> {
        self.nodes.front()
    }

    /// 队尾节点，即最近一次入队的节点。
    pub fn rear(&self) -> Option<&QueueNode> {
        self.nodes.back()
    }

    /// 将节点追加到队尾；空队列时它同时成为队首。
    pub fn push_back(&mut self, node: QueueNode) {
        self.nodes.push_back(node);
    }

    /// 摘除队首节点；空队列返回 `None` 而非故障。
    pub fn pop_front(&mut self) -> Option<QueueNode> {
        self.nodes.pop_front()
    }

    /// 将 `other` 的全部节点按原顺序接到队尾，`other` 随后为空。
    pub fn append(&mut self, other: &mut Queue) {
        self.nodes.append(&mut other.nodes);
    }

    /// 一次性摘除全部节点，队列随后为空。
    pub fn take_all(&mut self) -> VecDeque<QueueNode> {
        core::mem::take(&mut self.nodes)
    }

    /// 从队首到队尾遍历节点。
    pub fn iter(&self) -> impl Iterator<Item = &QueueNode> {
        self.nodes.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut QueueNode> {
        self.nodes.iter_mut()
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(index: i64) -> QueueNode {
        let mut node = QueueNode::new();
        node.set_index(index);
        node
    }

    fn indices(queue: &Queue) -> Vec<i64> {
        queue.iter().map(QueueNode::index).collect()
    }

    #[test]
    fn fresh_queue_is_empty() {
        let mut queue = Queue::new(QueueKind::Work);
        assert_eq!(queue.len(), 0);
        assert!(queue.front().is_none() && queue.rear().is_none());
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn single_node_is_both_front_and_rear() {
        let mut queue = Queue::new(QueueKind::Free);
        queue.push_back(node(5));
        assert_eq!(queue.front().map(QueueNode::index), Some(5));
        assert_eq!(queue.rear().map(QueueNode::index), Some(5));

        let popped = queue.pop_front().expect("唯一节点");
        assert_eq!(popped.index(), 5);
        assert!(queue.front().is_none() && queue.rear().is_none());
    }

    #[test]
    fn append_concatenates_in_order() {
        let mut free = Queue::new(QueueKind::Free);
        let mut work = Queue::new(QueueKind::Work);
        free.push_back(node(1));
        work.push_back(node(2));
        work.push_back(node(3));

        free.append(&mut work);
        assert_eq!(indices(&free), vec![1, 2, 3]);
        assert!(work.is_empty());
        assert_eq!(free.rear().map(QueueNode::index), Some(3));
    }

    #[test]
    fn init_is_idempotent_and_hands_back_residue() {
        let mut queue = Queue::new(QueueKind::Work);
        queue.push_back(node(1));
        queue.push_back(node(2));

        let residue = queue.init(QueueKind::Free);
        assert_eq!(residue.iter().map(QueueNode::index).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(queue.kind(), QueueKind::Free);
        assert!(queue.init(QueueKind::Free).is_empty());
        assert!(queue.is_empty());
    }
}
