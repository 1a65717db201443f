//! JobStore port - ジョブ記録の正本（source of truth）
//!
//! # 契約
//! - `save`: `record.id` をキーにした upsert
//! - `find`: 点検索。`None` は「未知の ID」であってエラーではない
//!
//! 1 つの id に書き込むのはエンジンだけ（ジョブごとに単一ライター）なので、
//! 実装側で read-modify-write の保護は要らない。

use async_trait::async_trait;

use crate::domain::{JobId, JobRecord, StoreError};

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or overwrite the record keyed by `record.id`.
    async fn save(&self, record: JobRecord) -> Result<(), StoreError>;

    /// Point lookup.
    async fn find(&self, id: &JobId) -> Result<Option<JobRecord>, StoreError>;
}
