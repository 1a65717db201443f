//! Status - エンジンの状態スナップショット
//!
//! キューと permit の数を一度に見るためのもの。値は取得した瞬間のもので、
//! 各カウンタは別々に読まれるため厳密に同時点ではない。

use serde::{Deserialize, Serialize};

use super::gate::GateCounts;
use super::limiter::AdmissionLimiter;
use crate::config::OverflowPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Accepted jobs not yet claimed by a worker.
    pub pending: usize,
    pub queue_capacity: usize,
    pub workers: usize,
    pub idle_workers: usize,
    pub max_concurrent: usize,
    pub available_permits: usize,
    pub overflow_policy: OverflowPolicy,
    pub shut_down: bool,
}

impl EngineStatus {
    pub(crate) fn collect(
        gate: GateCounts,
        limiter: &AdmissionLimiter,
        workers: usize,
        overflow_policy: OverflowPolicy,
        shut_down: bool,
    ) -> Self {
        Self {
            pending: gate.pending,
            queue_capacity: gate.capacity,
            workers,
            idle_workers: gate.idle_workers,
            max_concurrent: limiter.max_concurrent(),
            available_permits: limiter.available(),
            overflow_policy,
            shut_down,
        }
    }

    /// Jobs currently holding a permit.
    pub fn running(&self) -> usize {
        self.max_concurrent.saturating_sub(self.available_permits)
    }

    /// Room left in the queue before the overflow policy kicks in.
    pub fn headroom(&self) -> usize {
        (self.idle_workers + self.queue_capacity).saturating_sub(self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn collects_limiter_and_gate_counts() {
        let limiter = AdmissionLimiter::new(4);
        let _held = limiter.try_acquire(Duration::ZERO).await.unwrap();
        let gate = GateCounts {
            pending: 3,
            idle_workers: 1,
            capacity: 10,
        };

        let status = EngineStatus::collect(gate, &limiter, 2, OverflowPolicy::Reject, false);

        assert_eq!(status.running(), 1);
        assert_eq!(status.available_permits, 3);
        assert_eq!(status.headroom(), 8);
    }

    #[test]
    fn serializes_policy_in_snake_case() {
        let status = EngineStatus {
            pending: 0,
            queue_capacity: 0,
            workers: 1,
            idle_workers: 1,
            max_concurrent: 1,
            available_permits: 1,
            overflow_policy: OverflowPolicy::CallerRuns,
            shut_down: true,
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["overflow_policy"], "caller_runs");
        assert_eq!(json["shut_down"], true);
    }
}
