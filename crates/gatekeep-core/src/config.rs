//! Engine configuration.
//!
//! All bounds are per process. Defaults match a small single-node deployment.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker_threads must be at least 1")]
    NoWorkers,

    #[error("simulated_min_ms ({min}) is greater than simulated_max_ms ({max})")]
    InvertedSimulatedRange { min: u64, max: u64 },

    #[error("chunk_ms must be at least 1")]
    ZeroChunk,

    #[error("invalid config document: {0}")]
    Parse(String),
}

/// What the gate does with a submission when the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Refuse synchronously; the job is REJECTED with `queue_full`.
    #[default]
    Reject,

    /// Run the job on the submitting task instead of queueing it.
    CallerRuns,
}

/// How the simulated workload spends each chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkMode {
    #[default]
    Sleep,

    /// Busy-loop on the blocking pool.
    CpuBurn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Permit pool size. 0 means nothing is ever admitted.
    #[serde(alias = "maxConcurrent")]
    pub max_concurrent: usize,

    #[serde(alias = "workerThreads")]
    pub worker_threads: usize,

    /// Jobs held beyond those handed straight to idle workers.
    #[serde(alias = "queueCapacity")]
    pub queue_capacity: usize,

    #[serde(
        alias = "admissionTimeout",
        alias = "admissionTimeoutMs",
        alias = "acquireTimeoutMs"
    )]
    pub admission_timeout_ms: u64,

    #[serde(alias = "overflowPolicy")]
    pub overflow_policy: OverflowPolicy,
}

impl ConcurrencyConfig {
    pub fn admission_timeout(&self) -> Duration {
        Duration::from_millis(self.admission_timeout_ms)
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            worker_threads: 8,
            queue_capacity: 200,
            admission_timeout_ms: 50,
            overflow_policy: OverflowPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Deadline each admitted job gets, measured from admission.
    #[serde(alias = "timeoutMs", alias = "processingTimeout", alias = "processingTimeoutMs")]
    pub timeout_ms: u64,

    #[serde(alias = "simulatedMinMs")]
    pub simulated_min_ms: u64,
    #[serde(alias = "simulatedMaxMs")]
    pub simulated_max_ms: u64,

    /// Granularity of the deadline check inside the workload.
    #[serde(alias = "chunkMs")]
    pub chunk_ms: u64,

    #[serde(alias = "workMode")]
    pub work_mode: WorkMode,
}

impl ProcessingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn chunk(&self) -> Duration {
        Duration::from_millis(self.chunk_ms)
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1500,
            simulated_min_ms: 80,
            simulated_max_ms: 2200,
            chunk_ms: 25,
            work_mode: WorkMode::Sleep,
        }
    }
}

/// Full engine configuration.
///
/// # 使用例
/// ```
/// use gatekeep_core::config::GatekeepConfig;
///
/// let config = GatekeepConfig::from_json_str(r#"{"concurrency": {"max_concurrent": 2}}"#).unwrap();
/// assert_eq!(config.concurrency.max_concurrent, 2);
/// assert_eq!(config.concurrency.worker_threads, 8);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatekeepConfig {
    pub concurrency: ConcurrencyConfig,
    pub processing: ProcessingConfig,
}

impl GatekeepConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(document).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency.worker_threads == 0 {
            return Err(ConfigError::NoWorkers);
        }
        let p = &self.processing;
        if p.simulated_min_ms > p.simulated_max_ms {
            return Err(ConfigError::InvertedSimulatedRange {
                min: p.simulated_min_ms,
                max: p.simulated_max_ms,
            });
        }
        if p.chunk_ms == 0 {
            return Err(ConfigError::ZeroChunk);
        }
        Ok(())
    }
}
