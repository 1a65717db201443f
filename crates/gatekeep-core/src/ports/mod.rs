//! Ports - 抽象化レイヤー
//!
//! エンジンが外部に求めるインターフェース。実装は `impls` にあり、
//! オーケストレーターはどの実装が使われているかを知らない。

pub mod clock;
pub mod id_generator;
pub mod interrupt;
pub mod job_store;
pub mod workload;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::interrupt::{Interrupt, InterruptHandle};
pub use self::job_store::JobStore;
pub use self::workload::{ExecError, ExecutionContext, Workload};
