//! Errors - エラー型と分類
//!
//! - `ErrorReason`: terminal record の `error` に入る機械可読コード
//! - `GatekeepError`: エンジン境界で返すエラー
//! - `StoreError`: JobStore backend のエラー

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::{JobId, JobStatus};
use crate::config::ConfigError;

/// Machine-readable reason stored on a REJECTED or FAILED record.
///
/// Serialized as its code: `queue_full`, `concurrency_limit_reached`,
/// `timeout`, `interrupted`, `error:<kind>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ErrorReason {
    /// Refused by the backpressure gate. Retryable.
    QueueFull,

    /// No permit within the admission wait. Retryable.
    ConcurrencyLimitReached,

    /// Processing deadline exceeded.
    Timeout,

    /// The worker was interrupted (shutdown).
    Interrupted,

    /// Any other execution failure, classified by `kind`.
    Failure(String),
}

impl ErrorReason {
    pub fn failure(kind: impl Into<String>) -> Self {
        ErrorReason::Failure(kind.into())
    }

    pub fn code(&self) -> String {
        match self {
            ErrorReason::QueueFull => "queue_full".to_string(),
            ErrorReason::ConcurrencyLimitReached => "concurrency_limit_reached".to_string(),
            ErrorReason::Timeout => "timeout".to_string(),
            ErrorReason::Interrupted => "interrupted".to_string(),
            ErrorReason::Failure(kind) => format!("error:{kind}"),
        }
    }

    /// The state a record lands in when it terminates with this reason.
    pub fn terminal_status(&self) -> JobStatus {
        match self {
            ErrorReason::QueueFull | ErrorReason::ConcurrencyLimitReached => JobStatus::Rejected,
            ErrorReason::Timeout | ErrorReason::Interrupted | ErrorReason::Failure(_) => {
                JobStatus::Failed
            }
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl From<ErrorReason> for String {
    fn from(reason: ErrorReason) -> Self {
        reason.code()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown error reason code: {0}")]
pub struct UnknownReason(pub String);

impl TryFrom<String> for ErrorReason {
    type Error = UnknownReason;

    fn try_from(code: String) -> Result<Self, UnknownReason> {
        match code.as_str() {
            "queue_full" => Ok(ErrorReason::QueueFull),
            "concurrency_limit_reached" => Ok(ErrorReason::ConcurrencyLimitReached),
            "timeout" => Ok(ErrorReason::Timeout),
            "interrupted" => Ok(ErrorReason::Interrupted),
            other => match other.strip_prefix("error:") {
                Some(kind) if !kind.is_empty() => Ok(ErrorReason::Failure(kind.to_string())),
                _ => Err(UnknownReason(code)),
            },
        }
    }
}

/// Failure of a `JobStore` backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum GatekeepError {
    #[error("invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("job id already in use: {0}")]
    DuplicateJobId(JobId),

    #[error("engine is shut down")]
    ShutDown,

    #[error("no tokio runtime to spawn workers on")]
    NoRuntime,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorReason::QueueFull, "queue_full")]
    #[case(ErrorReason::ConcurrencyLimitReached, "concurrency_limit_reached")]
    #[case(ErrorReason::Timeout, "timeout")]
    #[case(ErrorReason::Interrupted, "interrupted")]
    #[case(ErrorReason::failure("panic"), "error:panic")]
    fn codes_match_wire_names(#[case] reason: ErrorReason, #[case] code: &str) {
        assert_eq!(reason.code(), code);
        assert_eq!(serde_json::to_value(&reason).unwrap(), code);
        assert_eq!(ErrorReason::try_from(code.to_string()).unwrap(), reason);
    }

    #[test]
    fn unknown_codes_are_refused() {
        assert!(ErrorReason::try_from("nope".to_string()).is_err());
        assert!(ErrorReason::try_from("error:".to_string()).is_err());
        assert!(serde_json::from_str::<ErrorReason>("\"boom\"").is_err());
    }

    #[test]
    fn rejection_reasons_map_to_rejected() {
        assert_eq!(ErrorReason::QueueFull.terminal_status(), JobStatus::Rejected);
        assert_eq!(
            ErrorReason::ConcurrencyLimitReached.terminal_status(),
            JobStatus::Rejected
        );
        assert_eq!(ErrorReason::Timeout.terminal_status(), JobStatus::Failed);
        assert_eq!(ErrorReason::failure("io").terminal_status(), JobStatus::Failed);
    }
}
