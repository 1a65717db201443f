//! Job record and lifecycle transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{ErrorReason, GatekeepError};
use super::ids::JobId;
use super::state::JobStatus;

/// How a transport layer should surface a record to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeClass {
    /// Not terminal yet; poll again.
    Pending,
    Succeeded,
    /// REJECTED: back off and retry later.
    RetryableOverload,
    /// FAILED: do not retry, report the reason.
    NonRetryableFailure,
}

/// Current lifecycle record of one job.
///
/// Design: this is the only shape the store ever sees. All state changes go
/// through the transition methods below, which refuse any edge the lifecycle
/// graph does not have, so a terminal record is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,

    pub received_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// `completed_at - received_at`, fixed when the record terminates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReason>,
}

impl JobRecord {
    pub fn queued(id: JobId, received_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            received_at,
            started_at: None,
            completed_at: None,
            latency_ms: None,
            output: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Queued -> Running (permit granted).
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), GatekeepError> {
        self.check(JobStatus::Running)?;
        self.status = JobStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Running -> Succeeded.
    pub fn succeed(&mut self, output: String, now: DateTime<Utc>) -> Result<(), GatekeepError> {
        self.check(JobStatus::Succeeded)?;
        self.output = Some(output);
        self.finish(JobStatus::Succeeded, now);
        Ok(())
    }

    /// Terminate as REJECTED or FAILED, depending on `reason`.
    ///
    /// A record that never got a permit may only fail as `interrupted`; every
    /// other failure needs a running body.
    pub fn terminate(
        &mut self,
        reason: ErrorReason,
        now: DateTime<Utc>,
    ) -> Result<(), GatekeepError> {
        let to = reason.terminal_status();
        self.check(to)?;
        if self.status == JobStatus::Queued
            && to == JobStatus::Failed
            && reason != ErrorReason::Interrupted
        {
            return Err(self.invalid(to));
        }
        self.error = Some(reason);
        self.finish(to, now);
        Ok(())
    }

    pub fn outcome_class(&self) -> OutcomeClass {
        match self.status {
            JobStatus::Queued | JobStatus::Running => OutcomeClass::Pending,
            JobStatus::Succeeded => OutcomeClass::Succeeded,
            JobStatus::Rejected => OutcomeClass::RetryableOverload,
            JobStatus::Failed => OutcomeClass::NonRetryableFailure,
        }
    }

    fn finish(&mut self, to: JobStatus, now: DateTime<Utc>) {
        self.status = to;
        self.completed_at = Some(now);
        // wall clocks can step backwards; latency stays non-negative
        let latency = (now - self.received_at).num_milliseconds().max(0);
        self.latency_ms = Some(latency as u64);
    }

    fn check(&self, to: JobStatus) -> Result<(), GatekeepError> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(self.invalid(to))
        }
    }

    fn invalid(&self, to: JobStatus) -> GatekeepError {
        GatekeepError::InvalidTransition {
            id: self.id.clone(),
            from: self.status,
            to,
        }
    }
}
