//! App - エンジン本体
//!
//! ports を組み合わせて、受付から terminal state までのライフサイクルを実装します。
//!
//! # 主要コンポーネント
//! - **JobService**: submit / get / status / shutdown（オーケストレーター）
//! - **SubmissionGate + WorkerGroup**: 有界キューとワーカープール
//! - **AdmissionLimiter**: 同時実行数の permit
//! - **JobRunner**: permit 取得から結果の保存まで
//! - **DeadlineExecutor**: 締め切り付きのチャンク実行

pub mod deadline;
pub mod gate;
pub mod limiter;
pub mod runner;
pub mod service;
pub mod status;

// 主要な型を再エクスポート
pub use self::deadline::DeadlineExecutor;
pub use self::gate::{GateCounts, JobHandler, Offer, SubmissionGate, WorkerGroup};
pub use self::limiter::{AdmissionLimiter, AdmissionPermit};
pub use self::runner::{JobRunner, QueuedJob};
pub use self::service::{JobService, JobServiceBuilder};
pub use self::status::EngineStatus;
