//! InMemoryJobStore - デフォルトのジョブ記録ストア
//!
//! プロセス内だけで完結する。再起動やスケールアウトでデータは消える。

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::{JobId, JobRecord, StoreError};
use crate::ports::JobStore;

/// InMemoryJobStore は job id をキーにしたプロセス内のマップ
///
/// # 実装詳細
/// - `RwLock<HashMap<..>>`: `find` は並行に読める
/// - ロックは各操作の中で完結する（await を跨がない）
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    records: RwLock<HashMap<JobId, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn save(&self, record: JobRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find(&self, id: &JobId) -> Result<Option<JobRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }
}
