//! SimulatedWorkload - 実処理の代わりに時間だけを消費するワークロード
//!
//! 入力が長いほど遅くなる形を模倣し、±20% のジッターを加える。

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

use crate::app::deadline::DeadlineExecutor;
use crate::config::{ProcessingConfig, WorkMode};
use crate::domain::JobPayload;
use crate::ports::{ExecError, ExecutionContext, Workload};

/// Input characters per extra millisecond of planned work.
const CHARS_PER_MS: u64 = 25;

const JITTER_RATIO: f64 = 0.20;

const SUMMARY_MAX_CHARS: usize = 80;

/// Synthetic workload standing in for the real unit of work.
#[derive(Debug, Clone)]
pub struct SimulatedWorkload {
    min_ms: u64,
    max_ms: u64,
    executor: DeadlineExecutor,
}

impl SimulatedWorkload {
    pub fn new(min_ms: u64, max_ms: u64, chunk: Duration, mode: WorkMode) -> Self {
        Self {
            min_ms,
            max_ms: max_ms.max(min_ms),
            executor: DeadlineExecutor::new(chunk, mode),
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(
            config.simulated_min_ms,
            config.simulated_max_ms,
            config.chunk(),
            config.work_mode,
        )
    }

    pub fn plan(&self, input_chars: usize) -> Duration {
        self.plan_with(input_chars, &mut rand::thread_rng())
    }

    /// Planned duration for an input of `input_chars` characters.
    ///
    /// `min + chars / 25`, clamped to `[min, max]`, then a uniform pick within
    /// ±20% of that, still inside `[min, max]`.
    pub fn plan_with<R: Rng>(&self, input_chars: usize, rng: &mut R) -> Duration {
        let base = self
            .min_ms
            .saturating_add(input_chars as u64 / CHARS_PER_MS);
        let clamped = base.clamp(self.min_ms, self.max_ms);
        let jitter = (clamped as f64 * JITTER_RATIO).round() as u64;
        let lo = clamped.saturating_sub(jitter).max(self.min_ms);
        let hi = clamped.saturating_add(jitter).min(self.max_ms);
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

#[async_trait]
impl Workload for SimulatedWorkload {
    async fn run(
        &self,
        payload: &JobPayload,
        ctx: &mut ExecutionContext,
    ) -> Result<String, ExecError> {
        let planned = self.plan(payload.input_chars());
        tracing::info!(
            planned_ms = planned.as_millis() as u64,
            remaining_ms = ctx.remaining().as_millis() as u64,
            model = payload.model.as_deref().unwrap_or("-"),
            input_chars = payload.input_chars(),
            "workload planned"
        );

        self.executor.run(planned, ctx).await?;
        Ok(format!("ok: {}", summarize(&payload.prompt)))
    }
}

/// Trimmed prompt, cut to 77 chars + "..." when longer than 80.
pub fn summarize(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.chars().count() <= SUMMARY_MAX_CHARS {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(SUMMARY_MAX_CHARS - 3).collect();
    format!("{head}...")
}
