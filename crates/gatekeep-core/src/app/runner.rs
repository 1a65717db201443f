//! JobRunner - ワーカー側のジョブ実行
//!
//! # フロー
//! 1. JobStore から記録を読み直す（無ければ内部不整合としてログを出して中断）
//! 2. AdmissionLimiter に permit を要求（待ち時間は有界）
//! 3. RUNNING を保存し、締め切り付きで Workload を実行
//! 4. 結果を terminal state にして保存
//!
//! 失敗はすべてここで terminal record に変換され、呼び出し側へは伝播しない。
//! permit はどの経路でもスコープを抜けるときにちょうど一度だけ返却される。

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

use super::gate::JobHandler;
use super::limiter::AdmissionLimiter;
use crate::domain::{ErrorReason, JobId, JobPayload, JobRecord};
use crate::ports::{Clock, ExecError, ExecutionContext, Interrupt, JobStore, Workload};

/// A job accepted by the gate, waiting for a worker.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: JobId,
    pub payload: JobPayload,
}

pub struct JobRunner {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    limiter: AdmissionLimiter,
    workload: Arc<dyn Workload>,
    admission_timeout: Duration,
    processing_timeout: Duration,
    interrupt: Interrupt,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        limiter: AdmissionLimiter,
        workload: Arc<dyn Workload>,
        admission_timeout: Duration,
        processing_timeout: Duration,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            store,
            clock,
            limiter,
            workload,
            admission_timeout,
            processing_timeout,
            interrupt,
        }
    }

    pub fn limiter(&self) -> &AdmissionLimiter {
        &self.limiter
    }

    /// Drive one job from QUEUED to a terminal state.
    pub async fn execute(&self, job: QueuedJob) {
        let span = tracing::info_span!("job", job_id = %job.id);
        self.execute_inner(job).instrument(span).await
    }

    async fn execute_inner(&self, job: QueuedJob) {
        let mut record = match self.store.find(&job.id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::error!(event = "job.missing", "record missing at execution time; aborting");
                return;
            }
            Err(e) => {
                tracing::error!(event = "job.missing", error = %e, "record lookup failed; aborting");
                return;
            }
        };
        if record.is_terminal() {
            tracing::error!(status = %record.status, "record already terminal; aborting");
            return;
        }

        let mut interrupt = self.interrupt.clone();
        let permit = tokio::select! {
            biased;
            _ = interrupt.triggered() => None,
            permit = self.limiter.try_acquire(self.admission_timeout) => Some(permit),
        };
        let permit = match permit {
            Some(Some(permit)) => permit,
            Some(None) => {
                self.terminate(&mut record, ErrorReason::ConcurrencyLimitReached)
                    .await;
                tracing::warn!(
                    event = "job.rejected",
                    status = %record.status,
                    reason = "concurrency_limit_reached",
                    admission_timeout_ms = self.admission_timeout.as_millis() as u64,
                    latency_ms = record.latency_ms,
                    "job rejected"
                );
                return;
            }
            None => {
                self.terminate(&mut record, ErrorReason::Interrupted).await;
                tracing::warn!(
                    event = "job.completed",
                    status = %record.status,
                    reason = "interrupted",
                    latency_ms = record.latency_ms,
                    "job interrupted before admission"
                );
                return;
            }
        };

        if let Err(e) = record.start(self.clock.now()) {
            tracing::error!(error = %e, "cannot start job");
            return;
        }
        self.persist(&record).await;
        tracing::info!(
            event = "job.started",
            status = %record.status,
            timeout_ms = self.processing_timeout.as_millis() as u64,
            "job started"
        );

        let deadline = Instant::now() + self.processing_timeout;
        let result = self.run_body(job, deadline, interrupt).await;

        let now = self.clock.now();
        let transition = match result {
            Ok(ref output) => record.succeed(output.clone(), now),
            Err(ref e) => record.terminate(e.reason(), now),
        };
        if let Err(e) = transition {
            tracing::error!(error = %e, "cannot complete job");
            return;
        }
        self.persist(&record).await;

        match result {
            Ok(_) => tracing::info!(
                event = "job.completed",
                status = %record.status,
                latency_ms = record.latency_ms,
                "job completed"
            ),
            Err(ExecError::Failed { kind, message }) => tracing::error!(
                event = "job.completed",
                status = %record.status,
                reason = %kind,
                detail = %message,
                latency_ms = record.latency_ms,
                "job failed"
            ),
            Err(e) => tracing::warn!(
                event = "job.completed",
                status = %record.status,
                reason = %e.reason(),
                timeout_ms = self.processing_timeout.as_millis() as u64,
                latency_ms = record.latency_ms,
                "job failed"
            ),
        }

        permit.release();
    }

    /// Run the workload in its own task so a panic ends this job only.
    async fn run_body(
        &self,
        job: QueuedJob,
        deadline: Instant,
        interrupt: Interrupt,
    ) -> Result<String, ExecError> {
        let workload = Arc::clone(&self.workload);
        let QueuedJob { id, payload } = job;
        let body = tokio::spawn(
            async move {
                let mut ctx = ExecutionContext::new(id, deadline, interrupt);
                workload.run(&payload, &mut ctx).await
            }
            .in_current_span(),
        );

        match body.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(ExecError::failed("panic", panic_message(e))),
            Err(_) => Err(ExecError::Interrupted),
        }
    }

    async fn terminate(&self, record: &mut JobRecord, reason: ErrorReason) {
        match record.terminate(reason, self.clock.now()) {
            Ok(()) => self.persist(record).await,
            Err(e) => tracing::error!(error = %e, "cannot terminate job"),
        }
    }

    async fn persist(&self, record: &JobRecord) {
        if let Err(e) = self.store.save(record.clone()).await {
            tracing::error!(error = %e, status = %record.status, "failed to persist record");
        }
    }
}

fn panic_message(e: tokio::task::JoinError) -> String {
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[async_trait]
impl JobHandler<QueuedJob> for JobRunner {
    async fn handle(&self, worker_id: usize, job: QueuedJob) {
        tracing::debug!(worker_id, job_id = %job.id, "job claimed");
        self.execute(job).await;
    }
}
