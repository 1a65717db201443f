//! Job identifiers.
//!
//! `JobId` は呼び出し側が渡すヒント（任意）か、生成された ULID のどちらか。
//! 一度決まった ID は不変で、ストアのキーとしてそのまま使われる。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on the length of a job id, in characters.
pub const MAX_JOB_ID_CHARS: usize = 128;

/// Identifier of a submitted job.
///
/// Opaque string. Caller-supplied ids are kept as-is (modulo truncation),
/// generated ids are ULIDs so they sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wrap a caller-supplied id, truncated to [`MAX_JOB_ID_CHARS`].
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        match value.char_indices().nth(MAX_JOB_ID_CHARS) {
            Some((cut, _)) => Self(value[..cut].to_string()),
            None => Self(value),
        }
    }

    /// Pick the first non-blank hint, or call `fallback` when both are blank.
    ///
    /// # Example
    /// ```
    /// use gatekeep_core::domain::JobId;
    ///
    /// let id = JobId::resolve_or(Some("  "), Some("client-7"), || JobId::new("fresh"));
    /// assert_eq!(id.as_str(), "client-7");
    /// ```
    pub fn resolve_or(
        primary: Option<&str>,
        secondary: Option<&str>,
        fallback: impl FnOnce() -> Self,
    ) -> Self {
        [primary, secondary]
            .into_iter()
            .flatten()
            .find(|hint| !hint.trim().is_empty())
            .map(Self::new)
            .unwrap_or_else(fallback)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
