use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use gatekeep_core::config::{OverflowPolicy, WorkMode};
use gatekeep_core::{EngineStatus, GatekeepConfig, JobId, JobPayload, JobRecord, JobService};

/// バッチのジョブを投入し、全部が終わるまで待って結果を出力する
#[derive(Parser, Debug)]
#[command(name = "gatekeep")]
#[command(version)]
#[command(about = "Drive the admission-controlled job engine with synthetic jobs")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of jobs to submit
    #[arg(long, short = 'n', default_value = "20")]
    jobs: usize,

    /// Submit from this many concurrent clients
    #[arg(long, default_value = "4")]
    clients: usize,

    /// Model name attached to every payload
    #[arg(long)]
    model: Option<String>,

    // === Concurrency ===
    #[arg(long)]
    max_concurrent: Option<usize>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    queue_capacity: Option<usize>,

    #[arg(long)]
    admission_timeout_ms: Option<u64>,

    #[arg(long, value_enum)]
    overflow_policy: Option<PolicyArg>,

    // === Processing ===
    /// Per-job deadline
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    min_ms: Option<u64>,

    #[arg(long)]
    max_ms: Option<u64>,

    #[arg(long)]
    chunk_ms: Option<u64>,

    #[arg(long, value_enum)]
    work_mode: Option<ModeArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Reject,
    CallerRuns,
}

impl From<PolicyArg> for OverflowPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Reject => OverflowPolicy::Reject,
            PolicyArg::CallerRuns => OverflowPolicy::CallerRuns,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Sleep,
    CpuBurn,
}

impl From<ModeArg> for WorkMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Sleep => WorkMode::Sleep,
            ModeArg::CpuBurn => WorkMode::CpuBurn,
        }
    }
}

impl Args {
    fn load_config(&self) -> anyhow::Result<GatekeepConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let document = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                GatekeepConfig::from_json_str(&document)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => GatekeepConfig::default(),
        };

        let c = &mut config.concurrency;
        if let Some(v) = self.max_concurrent {
            c.max_concurrent = v;
        }
        if let Some(v) = self.workers {
            c.worker_threads = v;
        }
        if let Some(v) = self.queue_capacity {
            c.queue_capacity = v;
        }
        if let Some(v) = self.admission_timeout_ms {
            c.admission_timeout_ms = v;
        }
        if let Some(v) = self.overflow_policy {
            c.overflow_policy = v.into();
        }

        let p = &mut config.processing;
        if let Some(v) = self.timeout_ms {
            p.timeout_ms = v;
        }
        if let Some(v) = self.min_ms {
            p.simulated_min_ms = v;
        }
        if let Some(v) = self.max_ms {
            p.simulated_max_ms = v;
        }
        if let Some(v) = self.chunk_ms {
            p.chunk_ms = v;
        }
        if let Some(v) = self.work_mode {
            p.work_mode = v.into();
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[derive(Serialize)]
struct Summary {
    submitted: usize,
    outcomes: BTreeMap<String, usize>,
    engine: EngineStatus,
}

/// Prompt whose length varies with `i`, so planned durations spread out.
fn synthetic_prompt(i: usize) -> String {
    let words = 4 + (i * 37) % 600;
    let mut prompt = format!("job {i}:");
    for w in 0..words {
        prompt.push_str(if w % 2 == 0 { " lorem" } else { " ipsum" });
    }
    prompt
}

fn outcome_key(record: &JobRecord) -> String {
    match &record.error {
        Some(reason) => format!("{}:{}", record.status, reason),
        None => record.status.to_string(),
    }
}

async fn submit_all(
    service: &Arc<JobService>,
    jobs: usize,
    clients: usize,
    model: Option<String>,
) -> anyhow::Result<Vec<JobId>> {
    let clients = clients.clamp(1, jobs.max(1));
    let mut handles = Vec::with_capacity(clients);
    for client in 0..clients {
        let service = Arc::clone(service);
        let model = model.clone();
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for i in (client..jobs).step_by(clients) {
                let mut payload = JobPayload::new(synthetic_prompt(i));
                if let Some(model) = &model {
                    payload = payload.with_model(model.clone());
                }
                let record = service.submit(Some(&format!("job-{i:04}")), payload).await?;
                ids.push(record.id);
            }
            Ok::<_, gatekeep_core::GatekeepError>(ids)
        }));
    }

    let mut ids = Vec::with_capacity(jobs);
    for handle in handles {
        ids.extend(handle.await.context("submit task panicked")??);
    }
    ids.sort();
    Ok(ids)
}

async fn wait_all(service: &JobService, ids: &[JobId]) -> anyhow::Result<Vec<JobRecord>> {
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        loop {
            let record = service
                .get(id)
                .await?
                .with_context(|| format!("job {id} vanished from the store"))?;
            if record.is_terminal() {
                records.push(record);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
    Ok(records)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.load_config()?;

    let service = Arc::new(JobService::builder(config).build()?);
    let ids = submit_all(&service, args.jobs, args.clients, args.model.clone()).await?;
    let records = wait_all(&service, &ids).await?;

    let mut outcomes = BTreeMap::new();
    for record in &records {
        println!("{}", serde_json::to_string(record)?);
        *outcomes.entry(outcome_key(record)).or_insert(0) += 1;
    }

    let summary = Summary {
        submitted: ids.len(),
        outcomes,
        engine: service.status().await,
    };
    service.shutdown().await;

    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
