//! gatekeep-core
//!
//! 受付制御つきのジョブエンジン。有界の投入キュー、同時実行数を制限する
//! permit プール、ジョブごとの締め切り付き実行からなる。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, job, payload, errors）
//! - **ports**: 抽象化レイヤー（JobStore, Workload, Clock, Interrupt, IdGenerator）
//! - **impls**: 実装（InMemoryJobStore, SimulatedWorkload）
//! - **app**: エンジン本体（service, gate, limiter, runner, deadline, status）
//! - **config**: 設定とその検証

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use self::app::{EngineStatus, JobService, JobServiceBuilder};
pub use self::config::GatekeepConfig;
pub use self::domain::{ErrorReason, GatekeepError, JobId, JobPayload, JobRecord, JobStatus};
