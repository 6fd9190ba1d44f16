//! In-process external tracker

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AdapterError, AdapterResult, PushOutcome, SyncAdapter};
use crate::clock::Clock;
use crate::models::{ExternalTask, Integration, Provider, Task};

/// Keeps external records in memory. Useful for dry runs and for tests that
/// need to edit the "remote" side directly.
#[derive(Debug)]
pub struct MemoryAdapter {
    records: RwLock<HashMap<String, ExternalTask>>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl MemoryAdapter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            clock,
        }
    }

    pub async fn get(&self, external_id: &str) -> Option<ExternalTask> {
        self.records.read().await.get(external_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Modify a record as if edited on the provider side.
    ///
    /// Stamps `last_modified` with the current clock time. Returns false when
    /// the record does not exist.
    pub async fn edit_external(
        &self,
        external_id: &str,
        edit: impl FnOnce(&mut ExternalTask) + Send,
    ) -> bool {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(external_id) else {
            return false;
        };
        edit(record);
        record.last_modified = self.clock.now_millis();
        true
    }

    /// Delete a record as if removed on the provider side
    pub async fn remove(&self, external_id: &str) -> Option<ExternalTask> {
        self.records.write().await.remove(external_id)
    }
}

#[async_trait]
impl SyncAdapter for MemoryAdapter {
    fn provider(&self) -> Provider {
        Provider::Memory
    }

    async fn push_task(
        &self,
        task: &Task,
        _integration: &Integration,
        external_id: Option<&str>,
    ) -> AdapterResult<PushOutcome> {
        let now = self.clock.now_millis();
        let mut records = self.records.write().await;

        let external_id = match external_id {
            Some(id) if records.contains_key(id) => id.to_string(),
            Some(id) => return Err(AdapterError::NotFound(id.to_string())),
            None => format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
        };

        let mut record = self.map_to_external(task);
        record.external_id.clone_from(&external_id);
        record.last_modified = now;
        record.url = Some(format!("memory://{external_id}"));
        records.insert(external_id.clone(), record);

        Ok(PushOutcome {
            external_id,
            last_modified: now,
        })
    }

    async fn pull_task(
        &self,
        external_id: &str,
        _integration: &Integration,
    ) -> AdapterResult<ExternalTask> {
        self.get(external_id)
            .await
            .ok_or_else(|| AdapterError::NotFound(external_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn integration() -> Integration {
        Integration::new("ws", Provider::Memory, "board")
    }

    #[tokio::test]
    async fn push_creates_then_updates() {
        let clock = ManualClock::new(100);
        let adapter = MemoryAdapter::new(Arc::new(clock.clone()));
        let task = Task::new_at("ws", "Plan sprint", 50);

        let created = adapter.push_task(&task, &integration(), None).await.unwrap();
        assert_eq!(created.external_id, "mem-1");
        assert_eq!(created.last_modified, 100);

        clock.advance(Duration::from_secs(1));
        let mut renamed = task.clone();
        renamed.title = "Plan next sprint".to_string();
        let updated = adapter
            .push_task(&renamed, &integration(), Some(&created.external_id))
            .await
            .unwrap();
        assert_eq!(updated.external_id, "mem-1");
        assert_eq!(updated.last_modified, 1_100);
        assert_eq!(adapter.len().await, 1);
        assert_eq!(adapter.get("mem-1").await.unwrap().title, "Plan next sprint");
    }

    #[tokio::test]
    async fn push_to_unknown_id_is_not_found() {
        let adapter = MemoryAdapter::new(Arc::new(ManualClock::new(0)));
        let task = Task::new_at("ws", "Ghost", 0);
        let result = adapter.push_task(&task, &integration(), Some("mem-9")).await;
        assert!(matches!(result, Err(AdapterError::NotFound(_))));
    }

    #[tokio::test]
    async fn external_edits_bump_last_modified() {
        let clock = ManualClock::new(10);
        let adapter = MemoryAdapter::new(Arc::new(clock.clone()));
        let task = Task::new_at("ws", "Draft", 0);
        let pushed = adapter.push_task(&task, &integration(), None).await.unwrap();

        clock.set(500);
        assert!(
            adapter
                .edit_external(&pushed.external_id, |record| {
                    record.title = "Edited remotely".to_string();
                })
                .await
        );
        let pulled = adapter
            .pull_task(&pushed.external_id, &integration())
            .await
            .unwrap();
        assert_eq!(pulled.title, "Edited remotely");
        assert_eq!(pulled.last_modified, 500);

        assert!(!adapter.edit_external("missing", |_| {}).await);
        adapter.remove(&pushed.external_id).await;
        assert!(adapter.is_empty().await);
    }
}
