//! 有界任务队列 + 固定数量 worker 线程。
//!
//! 任务按提交顺序入队，完成顺序不定；调用方需要的顺序信息（例如曲目序号）
//! 应当在提交时随任务一起捕获。

use std::thread;

use crossbeam_channel as channel;
use tracing::error;

/// 用 `workers` 个线程执行全部 `jobs`，等待所有任务结束后返回结果（顺序为完成顺序）。
///
/// 若线程创建失败，剩余 worker 继续消费队列；一个都没创建成功时返回空结果。
pub(crate) fn run_pool<J, R, F>(workers: usize, jobs: Vec<J>, work: F) -> Vec<R>
where
    J: Send,
    R: Send,
    F: Fn(J) -> R + Sync,
{
    if jobs.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, jobs.len());
    let (job_tx, job_rx) = channel::bounded::<J>(workers);
    let (res_tx, res_rx) = channel::unbounded::<R>();
    let total = jobs.len();

    thread::scope(|scope| {
        let work = &work;
        for idx in 0..workers {
            let rx = job_rx.clone();
            let tx = res_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("track-worker-{idx}"))
                .spawn_scoped(scope, move || {
                    for job in rx.iter() {
                        if tx.send(work(job)).is_err() {
                            return;
                        }
                    }
                });
            if let Err(err) = spawned {
                error!("创建下载线程失败: {}", err);
            }
        }
        // 只保留 worker 手里的端点，worker 全部退出后结果通道自然关闭
        drop(job_rx);
        drop(res_tx);

        for job in jobs {
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);

        let mut results = Vec::with_capacity(total);
        results.extend(res_rx.iter());
        results
    })
}
