//! Domain model (ids, lifecycle states, records, error codes).

pub mod errors;
pub mod ids;
pub mod job;
pub mod payload;
pub mod state;

pub use self::errors::{ErrorReason, GatekeepError, StoreError, UnknownReason};
pub use self::ids::{JobId, MAX_JOB_ID_CHARS};
pub use self::job::{JobRecord, OutcomeClass};
pub use self::payload::JobPayload;
pub use self::state::JobStatus;
