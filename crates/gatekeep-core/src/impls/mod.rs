//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryJobStore**: デフォルトのジョブ記録ストア
//! - **SimulatedWorkload**: 合成ワークロード（実処理の代役）
//!
//! 外部ストア（Redis/DB など）の実装は別クレートに置く想定。

pub mod inmem_store;
pub mod simulated;

pub use self::inmem_store::InMemoryJobStore;
pub use self::simulated::SimulatedWorkload;
