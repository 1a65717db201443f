//! SubmissionGate + WorkerGroup - 有界キューとワーカープール
//!
//! # 設計
//! - ジョブ本体は `pending`（FIFO）に入り、固定数のワーカーが取り出す
//! - アイドルなワーカーへ直接渡せる分 + `capacity` までしか受け付けない
//! - 溢れたら `OverflowPolicy` に従う（即拒否 or 呼び出し側で実行）
//!
//! `capacity = 0` のときは、空いているワーカーがすぐ受け取れる場合だけ受け付ける。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::config::OverflowPolicy;

/// Result of offering a job to the gate.
#[derive(Debug)]
pub enum Offer<J> {
    /// Queued; a worker will pick it up.
    Queued,

    /// Queue full under `CallerRuns`: the submitter must run the job itself.
    RunOnCaller(J),

    /// Queue full under `Reject`, or the gate is closed. The job is dropped.
    Refused,
}

/// Observability snapshot of the gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCounts {
    pub pending: usize,
    pub idle_workers: usize,
    pub capacity: usize,
}

/// Executes jobs claimed by the worker group.
#[async_trait]
pub trait JobHandler<J: Send + 'static>: Send + Sync + 'static {
    async fn handle(&self, worker_id: usize, job: J);
}

struct GateState<J> {
    pending: VecDeque<J>,
    /// Workers not currently executing a job.
    idle: usize,
    closed: bool,
}

/// Bounded FIFO in front of the worker group.
pub struct SubmissionGate<J> {
    state: Mutex<GateState<J>>,
    notify: Notify,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<J: Send> SubmissionGate<J> {
    pub fn new(workers: usize, capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(GateState {
                pending: VecDeque::new(),
                idle: workers,
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            policy,
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Never waits on anything but the internal lock.
    pub async fn offer(&self, job: J) -> Offer<J> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Offer::Refused;
            }
            if state.pending.len() >= state.idle + self.capacity {
                return match self.policy {
                    OverflowPolicy::Reject => Offer::Refused,
                    OverflowPolicy::CallerRuns => Offer::RunOnCaller(job),
                };
            }
            state.pending.push_back(job);
        }
        self.notify.notify_one();
        Offer::Queued
    }

    /// Stop accepting. Workers drain what is already pending, then exit.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    pub async fn counts(&self) -> GateCounts {
        let state = self.state.lock().await;
        GateCounts {
            pending: state.pending.len(),
            idle_workers: state.idle,
            capacity: self.capacity,
        }
    }

    /// Next job in FIFO order, or `None` once closed and drained.
    async fn claim(&self) -> Option<J> {
        loop {
            // register before checking, so a close() in between is not missed
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if let Some(job) = state.pending.pop_front() {
                    state.idle = state.idle.saturating_sub(1);
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    async fn finished(&self) {
        self.state.lock().await.idle += 1;
    }
}

/// WorkerGroup はワーカー群のハンドル
/// - `SubmissionGate::close` でワーカーは残りを処理してから止まる
/// - `join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers pulling from `gate`.
    pub fn spawn<J, H>(n: usize, gate: Arc<SubmissionGate<J>>, handler: Arc<H>) -> Self
    where
        J: Send + 'static,
        H: JobHandler<J>,
    {
        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let gate = Arc::clone(&gate);
            let handler = Arc::clone(&handler);
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, gate, handler).await;
            }));
        }
        Self { joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Wait for every worker to exit (close the gate first).
    pub async fn join(self) {
        for join in self.joins {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "worker task ended abnormally");
            }
        }
    }
}

async fn worker_loop<J, H>(worker_id: usize, gate: Arc<SubmissionGate<J>>, handler: Arc<H>)
where
    J: Send + 'static,
    H: JobHandler<J>,
{
    while let Some(job) = gate.claim().await {
        // a panicking handler ends this job, not the worker
        let handler = Arc::clone(&handler);
        let run = tokio::spawn(async move { handler.handle(worker_id, job).await });
        if let Err(e) = run.await {
            tracing::error!(worker_id, error = %e, "job handler ended abnormally");
        }
        gate.finished().await;
    }
    tracing::debug!(worker_id, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Records job ids; blocks each job until a permit is added to `release`.
    struct Recorder {
        seen: StdMutex<Vec<u32>>,
        release: Semaphore,
    }

    impl Recorder {
        fn new(open: bool) -> Arc<Self> {
            let permits = if open { Semaphore::MAX_PERMITS } else { 0 };
            Arc::new(Self {
                seen: StdMutex::new(Vec::new()),
                release: Semaphore::new(permits),
            })
        }
    }

    #[async_trait]
    impl JobHandler<u32> for Recorder {
        async fn handle(&self, _worker_id: usize, job: u32) {
            self.seen.lock().unwrap().push(job);
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn zero_capacity_hands_off_to_idle_worker_only() {
        let gate = Arc::new(SubmissionGate::new(1, 0, OverflowPolicy::Reject));
        let recorder = Recorder::new(false);
        let group = WorkerGroup::spawn(1, Arc::clone(&gate), Arc::clone(&recorder));

        assert!(matches!(gate.offer(1).await, Offer::Queued));
        wait_until(|| recorder.seen.lock().unwrap().len() == 1).await;

        // the only worker is busy and there is no queue
        assert!(matches!(gate.offer(2).await, Offer::Refused));

        recorder.release.add_permits(1);
        wait_until(|| gate.state.try_lock().map(|s| s.idle == 1).unwrap_or(false)).await;
        assert!(matches!(gate.offer(3).await, Offer::Queued));

        recorder.release.add_permits(Semaphore::MAX_PERMITS / 2);
        gate.close().await;
        group.join().await;
        assert_eq!(*recorder.seen.lock().unwrap(), vec![1, 3]);
    }

    /// Panics on odd jobs, records even ones.
    struct PanicsOnOdd {
        seen: StdMutex<Vec<u32>>,
    }

    #[async_trait]
    impl JobHandler<u32> for PanicsOnOdd {
        async fn handle(&self, _worker_id: usize, job: u32) {
            if job % 2 == 1 {
                panic!("handler failed on {job}");
            }
            self.seen.lock().unwrap().push(job);
        }
    }

    #[tokio::test]
    async fn handler_panic_keeps_the_worker_alive() {
        let gate = Arc::new(SubmissionGate::new(1, 10, OverflowPolicy::Reject));
        for i in 0..4 {
            assert!(matches!(gate.offer(i).await, Offer::Queued));
        }
        let handler = Arc::new(PanicsOnOdd {
            seen: StdMutex::new(Vec::new()),
        });
        let group = WorkerGroup::spawn(1, Arc::clone(&gate), Arc::clone(&handler));

        gate.close().await;
        tokio::time::timeout(Duration::from_secs(5), group.join())
            .await
            .expect("worker did not drain the queue");

        assert_eq!(*handler.seen.lock().unwrap(), vec![0, 2]);
        assert_eq!(gate.counts().await.idle_workers, 1);
    }

    #[tokio::test]
    async fn caller_runs_policy_returns_the_job() {
        let gate = SubmissionGate::new(0, 1, OverflowPolicy::CallerRuns);

        assert!(matches!(gate.offer(1).await, Offer::Queued));
        match gate.offer(2).await {
            Offer::RunOnCaller(job) => assert_eq!(job, 2),
            other => panic!("expected RunOnCaller, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn queue_is_fifo() {
        let gate = Arc::new(SubmissionGate::new(1, 10, OverflowPolicy::Reject));
        for i in 0..5 {
            assert!(matches!(gate.offer(i).await, Offer::Queued));
        }
        assert_eq!(gate.counts().await.pending, 5);

        let recorder = Recorder::new(true);
        let group = WorkerGroup::spawn(1, Arc::clone(&gate), Arc::clone(&recorder));
        gate.close().await;
        group.join().await;

        assert_eq!(*recorder.seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn closed_gate_refuses_and_workers_exit() {
        let gate = Arc::new(SubmissionGate::<u32>::new(2, 4, OverflowPolicy::CallerRuns));
        let group = WorkerGroup::spawn(2, Arc::clone(&gate), Recorder::new(true));
        assert_eq!(group.len(), 2);

        gate.close().await;
        assert!(matches!(gate.offer(9).await, Offer::Refused));

        tokio::time::timeout(Duration::from_secs(5), group.join())
            .await
            .expect("workers did not stop");
    }

    #[tokio::test]
    async fn counts_reflect_capacity() {
        let gate = SubmissionGate::<u32>::new(3, 7, OverflowPolicy::Reject);
        assert_eq!(
            gate.counts().await,
            GateCounts {
                pending: 0,
                idle_workers: 3,
                capacity: 7
            }
        );
    }
}
