//! JobService - ジョブのライフサイクルを束ねるオーケストレーター
//!
//! # 責務
//! - submit: QUEUED を保存してから gate に渡す（溢れたら REJECTED `queue_full`）
//! - get: ストアへの読み取りのみ
//! - status: キューと permit のスナップショット
//! - shutdown: 実行中・待機中のジョブを中断し、ワーカーを止める
//!
//! 実行側（permit の取得から terminal state まで）は `JobRunner` が担当する。
//! submit が呼び出し側をブロックするのは CallerRuns で溢れたときだけ。

use std::sync::Arc;
use tokio::sync::Mutex;

use super::gate::{Offer, SubmissionGate, WorkerGroup};
use super::limiter::AdmissionLimiter;
use super::runner::{JobRunner, QueuedJob};
use super::status::EngineStatus;
use crate::config::GatekeepConfig;
use crate::domain::{ErrorReason, GatekeepError, JobId, JobPayload, JobRecord};
use crate::impls::{InMemoryJobStore, SimulatedWorkload};
use crate::ports::{
    Clock, IdGenerator, Interrupt, InterruptHandle, JobStore, SystemClock, UlidGenerator, Workload,
};

/// JobServiceBuilder はエンジンを組み立てる
///
/// # 使用例
/// ```
/// use gatekeep_core::app::JobService;
/// use gatekeep_core::config::GatekeepConfig;
/// use gatekeep_core::domain::JobPayload;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let service = JobService::builder(GatekeepConfig::default()).build().unwrap();
/// let record = service.submit(Some("doc-1"), JobPayload::new("hello")).await.unwrap();
/// assert_eq!(record.id.as_str(), "doc-1");
/// service.shutdown().await;
/// # });
/// ```
///
/// 指定しなかった部品はデフォルト（InMemoryJobStore, SimulatedWorkload,
/// SystemClock, UlidGenerator）になる。
pub struct JobServiceBuilder {
    config: GatekeepConfig,
    store: Option<Arc<dyn JobStore>>,
    workload: Option<Arc<dyn Workload>>,
    clock: Option<Arc<dyn Clock>>,
    id_generator: Option<Arc<dyn IdGenerator>>,
}

impl JobServiceBuilder {
    pub fn new(config: GatekeepConfig) -> Self {
        Self {
            config,
            store: None,
            workload: None,
            clock: None,
            id_generator: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn workload(mut self, workload: Arc<dyn Workload>) -> Self {
        self.workload = Some(workload);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(id_generator);
        self
    }

    /// Validate the config, build the permit pool and spawn the workers.
    ///
    /// Must run inside a tokio runtime (`GatekeepError::NoRuntime` otherwise).
    pub fn build(self) -> Result<JobService, GatekeepError> {
        self.config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(GatekeepError::NoRuntime);
        }

        let Self {
            config,
            store,
            workload,
            clock,
            id_generator,
        } = self;
        let concurrency = &config.concurrency;

        let store = store.unwrap_or_else(|| Arc::new(InMemoryJobStore::new()));
        let workload = workload
            .unwrap_or_else(|| Arc::new(SimulatedWorkload::from_config(&config.processing)));
        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock));
        let id_generator = id_generator
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        let (interrupt_handle, interrupt) = Interrupt::channel();
        let limiter = AdmissionLimiter::new(concurrency.max_concurrent);
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            limiter,
            workload,
            concurrency.admission_timeout(),
            config.processing.timeout(),
            interrupt,
        ));
        let gate = Arc::new(SubmissionGate::new(
            concurrency.worker_threads,
            concurrency.queue_capacity,
            concurrency.overflow_policy,
        ));
        let workers = WorkerGroup::spawn(
            concurrency.worker_threads,
            Arc::clone(&gate),
            Arc::clone(&runner),
        );

        tracing::info!(
            max_concurrent = concurrency.max_concurrent,
            worker_threads = concurrency.worker_threads,
            queue_capacity = concurrency.queue_capacity,
            admission_timeout_ms = concurrency.admission_timeout_ms,
            overflow_policy = ?concurrency.overflow_policy,
            timeout_ms = config.processing.timeout_ms,
            "job service started"
        );

        Ok(JobService {
            config,
            store,
            clock,
            id_generator,
            gate,
            runner,
            interrupt: interrupt_handle,
            workers: Mutex::new(Some(workers)),
        })
    }
}

/// Admission-controlled job engine.
pub struct JobService {
    config: GatekeepConfig,
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    id_generator: Arc<dyn IdGenerator>,
    gate: Arc<SubmissionGate<QueuedJob>>,
    runner: Arc<JobRunner>,
    interrupt: InterruptHandle,
    workers: Mutex<Option<WorkerGroup>>,
}

impl JobService {
    pub fn builder(config: GatekeepConfig) -> JobServiceBuilder {
        JobServiceBuilder::new(config)
    }

    /// Start an engine with the given store and workload, defaults for the rest.
    pub fn start(
        config: GatekeepConfig,
        store: Arc<dyn JobStore>,
        workload: Arc<dyn Workload>,
    ) -> Result<Self, GatekeepError> {
        Self::builder(config).store(store).workload(workload).build()
    }

    pub fn config(&self) -> &GatekeepConfig {
        &self.config
    }

    /// Accept a job.
    ///
    /// Returns the QUEUED record, or the REJECTED (`queue_full`) record when
    /// the gate refuses it. Under `CallerRuns` overflow the job runs to
    /// completion before this returns, and the terminal record comes back.
    ///
    /// A blank `id_hint` gets a generated id. Reusing an id that is already
    /// stored is `GatekeepError::DuplicateJobId`.
    pub async fn submit(
        &self,
        id_hint: Option<&str>,
        payload: JobPayload,
    ) -> Result<JobRecord, GatekeepError> {
        self.submit_with_hints(id_hint, None, payload).await
    }

    /// `submit` with two id hints, e.g. a request header and a client request
    /// id. The first non-blank one wins; if both are blank an id is generated.
    pub async fn submit_with_hints(
        &self,
        primary: Option<&str>,
        secondary: Option<&str>,
        payload: JobPayload,
    ) -> Result<JobRecord, GatekeepError> {
        if self.interrupt.is_triggered() {
            return Err(GatekeepError::ShutDown);
        }

        let id = JobId::resolve_or(primary, secondary, || {
            self.id_generator.generate_job_id()
        });
        // check-then-save: two submits racing on one caller-supplied id can
        // both pass. Callers own their hint ids.
        if self.store.find(&id).await?.is_some() {
            return Err(GatekeepError::DuplicateJobId(id));
        }

        let mut record = JobRecord::queued(id.clone(), self.clock.now());
        self.store.save(record.clone()).await?;

        let job = QueuedJob {
            id: id.clone(),
            payload,
        };
        match self.gate.offer(job).await {
            Offer::Queued => {
                tracing::info!(event = "job.submit_enqueued", job_id = %id, "job queued");
                Ok(record)
            }
            Offer::Refused => {
                record.terminate(ErrorReason::QueueFull, self.clock.now())?;
                self.store.save(record.clone()).await?;
                tracing::warn!(
                    event = "job.submit_rejected",
                    job_id = %id,
                    reason = "queue_full",
                    "job rejected at submission"
                );
                Ok(record)
            }
            Offer::RunOnCaller(job) => {
                tracing::info!(event = "job.caller_runs", job_id = %id, "queue full; running on caller");
                self.runner.execute(job).await;
                Ok(self.store.find(&id).await?.unwrap_or(record))
            }
        }
    }

    /// Current record for `id`. `None` means the id is unknown.
    pub async fn get(&self, id: &JobId) -> Result<Option<JobRecord>, GatekeepError> {
        Ok(self.store.find(id).await?)
    }

    pub async fn status(&self) -> EngineStatus {
        EngineStatus::collect(
            self.gate.counts().await,
            self.runner.limiter(),
            self.config.concurrency.worker_threads,
            self.gate.policy(),
            self.interrupt.is_triggered(),
        )
    }

    pub fn is_shut_down(&self) -> bool {
        self.interrupt.is_triggered()
    }

    /// Stop the engine.
    ///
    /// Running jobs observe the interrupt and end FAILED (`interrupted`).
    /// Jobs still waiting in the queue are drained the same way. Returns once
    /// every worker has exited. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        self.interrupt.trigger();
        self.gate.close().await;
        let workers = self.workers.lock().await.take();
        if let Some(workers) = workers {
            let n = workers.len();
            workers.join().await;
            tracing::info!(workers = n, "job service stopped");
        }
    }
}
