//! Workload port - ジョブ本体（不透明な処理）
//!
//! エンジンはジョブの中身を見ない。payload を締め切りと中断シグナルを持つ
//! `ExecutionContext` と一緒に `Workload` へ渡し、結果を記録に反映するだけ。

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use super::interrupt::Interrupt;
use crate::domain::{ErrorReason, JobId, JobPayload};

/// Why a job body did not complete.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("deadline exceeded")]
    Timeout,

    #[error("interrupted")]
    Interrupted,

    #[error("{kind}: {message}")]
    Failed { kind: String, message: String },
}

impl ExecError {
    pub fn failed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        ExecError::Failed {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// The code recorded on the terminal record.
    pub fn reason(&self) -> ErrorReason {
        match self {
            ExecError::Timeout => ErrorReason::Timeout,
            ExecError::Interrupted => ErrorReason::Interrupted,
            ExecError::Failed { kind, .. } => ErrorReason::failure(kind.clone()),
        }
    }
}

/// Per-execution context handed to a workload.
#[derive(Debug)]
pub struct ExecutionContext {
    pub job_id: JobId,

    /// Absolute deadline on the tokio clock.
    pub deadline: Instant,

    pub interrupt: Interrupt,
}

impl ExecutionContext {
    pub fn new(job_id: JobId, deadline: Instant, interrupt: Interrupt) -> Self {
        Self {
            job_id,
            deadline,
            interrupt,
        }
    }

    /// Time left before the deadline (zero once it has passed).
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Workload は JobPayload を処理して出力を返す
///
/// # 契約
/// - 締め切り（`ctx.deadline`）を過ぎたら `ExecError::Timeout`
/// - 中断（`ctx.interrupt`）を観測したら `ExecError::Interrupted`
/// - それ以外の失敗は `ExecError::Failed { kind, .. }`
#[async_trait]
pub trait Workload: Send + Sync + 'static {
    async fn run(
        &self,
        payload: &JobPayload,
        ctx: &mut ExecutionContext,
    ) -> Result<String, ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_errors_map_to_reason_codes() {
        assert_eq!(ExecError::Timeout.reason().code(), "timeout");
        assert_eq!(ExecError::Interrupted.reason().code(), "interrupted");
        assert_eq!(
            ExecError::failed("io", "disk on fire").reason().code(),
            "error:io"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_saturates_at_zero() {
        let ctx = ExecutionContext::new(
            JobId::new("j"),
            Instant::now() + Duration::from_millis(30),
            Interrupt::never(),
        );
        assert_eq!(ctx.remaining(), Duration::from_millis(30));

        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(ctx.remaining(), Duration::ZERO);
        assert!(ctx.is_expired());
    }
}
