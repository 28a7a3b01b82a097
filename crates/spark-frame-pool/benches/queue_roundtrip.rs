use std::{env, hint::black_box, sync::Arc, time::Duration};

use criterion::Criterion;
use spark_frame_pool::{PoolConfig, QueueProcess, test_stubs::NoopLogger};

const FRAME_BYTES: usize = 4096;

/// 基准：单帧在缓冲池中的完整往返成本。
///
/// # 设计背景（Why）
/// - 缓冲池存在的意义是让稳态下的每帧交接不触发分配；基准应当反映“领取 → 写入 → 投递 →
///   出队 → 回收”这一稳态路径的开销，便于发现锁或复制引入的回归。
///
/// # 逻辑解析（How）
/// - 预分配若干 4 KiB 节点，循环执行一次完整往返；
/// - 另测一次批量重置，模拟消费者批处理结束后的回收。
fn bench_queue_roundtrip(c: &mut Criterion) {
    let pool = QueueProcess::with_config(
        PoolConfig::default()
            .with_preallocated_nodes(4)
            .with_block_capacity(FRAME_BYTES),
        Arc::new(NoopLogger),
    )
    .expect("构造缓冲池");
    let frame = vec![0x5au8; FRAME_BYTES];

    c.bench_function("queue_roundtrip", |b| {
        b.iter(|| {
            let mut node = pool.acquire_free(FRAME_BYTES).expect("领取节点");
            node.fill(&frame).expect("写入帧");
            pool.enqueue_work(node).expect("投递");
            let node = pool.dequeue_work().expect("出队").expect("节点");
            black_box(node.size());
            pool.recycle(node).expect("回收");
        });
    });

    c.bench_function("reset_free_queue_batch_of_4", |b| {
        b.iter(|| {
            for _ in 0..4 {
                let node = pool.acquire_free(FRAME_BYTES).expect("领取节点");
                pool.enqueue_work(node).expect("投递");
            }
            black_box(pool.reset_free_queue().expect("重置"));
        });
    });
}

fn main() {
    let mut quick_mode = false;
    for arg in env::args().skip(1) {
        if arg == "--quick" {
            quick_mode = true;
        }
    }

    let mut criterion = Criterion::default();
    if quick_mode {
        criterion = criterion
            .sample_size(10)
            .warm_up_time(Duration::from_millis(100))
            .measurement_time(Duration::from_millis(250));
    }

    bench_queue_roundtrip(&mut criterion);
    criterion.final_summary();
}
