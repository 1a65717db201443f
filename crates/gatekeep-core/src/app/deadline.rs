//! DeadlineExecutor - 締め切り付きのチャンク実行
//!
//! 計画された処理時間を小さなチャンクに分けて消化し、各チャンクの前に
//! 締め切りを確認する。途中で締め切りを過ぎた処理もすぐに timeout を観測できる。

use std::time::Duration;
use tokio::time::Instant;

use crate::config::WorkMode;
use crate::ports::{ExecError, ExecutionContext};

/// DeadlineExecutor は計画された作業を締め切り付きでチャンクごとに実行
///
/// # フロー
/// 1. 締め切りを過ぎていたら `ExecError::Timeout`
/// 2. 中断されていたら `ExecError::Interrupted`
/// 3. `min(chunk, 残り作業, 締め切りまで)` だけ処理
/// 4. 残り作業がなくなるまで繰り返す
///
/// チャンクは締め切りを越えないので、計画が長くても経過時間は締め切りで頭打ちになる。
#[derive(Debug, Clone)]
pub struct DeadlineExecutor {
    chunk: Duration,
    mode: WorkMode,
}

impl DeadlineExecutor {
    pub fn new(chunk: Duration, mode: WorkMode) -> Self {
        Self {
            chunk: chunk.max(Duration::from_millis(1)),
            mode,
        }
    }

    pub fn chunk(&self) -> Duration {
        self.chunk
    }

    pub async fn run(
        &self,
        planned: Duration,
        ctx: &mut ExecutionContext,
    ) -> Result<(), ExecError> {
        let mut remaining = planned;
        while !remaining.is_zero() {
            let now = Instant::now();
            if now >= ctx.deadline {
                return Err(ExecError::Timeout);
            }
            if ctx.interrupt.is_triggered() {
                return Err(ExecError::Interrupted);
            }

            let step = self.chunk.min(remaining).min(ctx.deadline - now);
            tokio::select! {
                biased;
                _ = ctx.interrupt.triggered() => return Err(ExecError::Interrupted),
                spent = self.spend(step) => spent?,
            }
            remaining -= step;
        }
        Ok(())
    }

    async fn spend(&self, step: Duration) -> Result<(), ExecError> {
        match self.mode {
            WorkMode::Sleep => {
                tokio::time::sleep(step).await;
                Ok(())
            }
            WorkMode::CpuBurn => tokio::task::spawn_blocking(move || burn_cpu(step))
                .await
                .map_err(|e| ExecError::failed("join", e.to_string())),
        }
    }
}

fn burn_cpu(step: Duration) {
    let end = std::time::Instant::now() + step;
    let mut sink = 0u64;
    while std::time::Instant::now() < end {
        sink = sink.rotate_left(5) ^ 0x9e37_79b9_7f4a_7c15;
    }
    std::hint::black_box(sink);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobId;
    use crate::ports::Interrupt;

    fn ctx(deadline_in: Duration, interrupt: Interrupt) -> ExecutionContext {
        ExecutionContext::new(JobId::new("j"), Instant::now() + deadline_in, interrupt)
    }

    #[tokio::test(start_paused = true)]
    async fn completes_when_plan_fits_deadline() {
        let exec = DeadlineExecutor::new(Duration::from_millis(25), WorkMode::Sleep);
        let mut ctx = ctx(Duration::from_millis(500), Interrupt::never());
        let start = Instant::now();

        exec.run(Duration::from_millis(100), &mut ctx).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn plan_ending_exactly_at_deadline_succeeds() {
        let exec = DeadlineExecutor::new(Duration::from_millis(25), WorkMode::Sleep);
        let mut ctx = ctx(Duration::from_millis(100), Interrupt::never());

        assert!(exec.run(Duration::from_millis(100), &mut ctx).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_and_never_runs_past_deadline() {
        let exec = DeadlineExecutor::new(Duration::from_millis(30), WorkMode::Sleep);
        let mut ctx = ctx(Duration::from_millis(50), Interrupt::never());
        let start = Instant::now();

        let err = exec.run(Duration::from_millis(200), &mut ctx).await.unwrap_err();

        assert_eq!(err, ExecError::Timeout);
        assert_eq!(start.elapsed(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_times_out_before_any_work() {
        let exec = DeadlineExecutor::new(Duration::from_millis(10), WorkMode::Sleep);
        let mut ctx = ctx(Duration::ZERO, Interrupt::never());

        let err = exec.run(Duration::from_millis(10), &mut ctx).await.unwrap_err();
        assert_eq!(err, ExecError::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_is_distinct_from_timeout() {
        let exec = DeadlineExecutor::new(Duration::from_millis(20), WorkMode::Sleep);
        let (handle, interrupt) = Interrupt::channel();
        let mut ctx = ctx(Duration::from_secs(10), interrupt);

        let run = tokio::spawn(async move { exec.run(Duration::from_secs(5), &mut ctx).await });
        tokio::time::sleep(Duration::from_millis(55)).await;
        handle.trigger();

        assert_eq!(run.await.unwrap(), Err(ExecError::Interrupted));
    }

    #[tokio::test(start_paused = true)]
    async fn already_interrupted_stops_immediately() {
        let exec = DeadlineExecutor::new(Duration::from_millis(20), WorkMode::Sleep);
        let (handle, interrupt) = Interrupt::channel();
        handle.trigger();
        let mut ctx = ctx(Duration::from_secs(10), interrupt);
        let start = Instant::now();

        assert_eq!(
            exec.run(Duration::from_secs(1), &mut ctx).await,
            Err(ExecError::Interrupted)
        );
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn cpu_burn_mode_completes() {
        let exec = DeadlineExecutor::new(Duration::from_millis(5), WorkMode::CpuBurn);
        let mut ctx = ctx(Duration::from_secs(5), Interrupt::never());

        assert!(exec.run(Duration::from_millis(15), &mut ctx).await.is_ok());
    }

    #[test]
    fn zero_chunk_is_raised_to_one_millisecond() {
        let exec = DeadlineExecutor::new(Duration::ZERO, WorkMode::Sleep);
        assert_eq!(exec.chunk(), Duration::from_millis(1));
    }
}
