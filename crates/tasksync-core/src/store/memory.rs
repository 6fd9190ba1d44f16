//! In-memory store implementations for embedding and tests

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IntegrationStore, SyncMetadataStore, SyncStatsStore, TaskStore};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::{
    Integration, IntegrationId, SyncKey, SyncMetadata, SyncMetadataPatch, SyncRun,
    SyncStatistics, SyncStatus, Task, TaskId, TaskPatch,
};
use crate::scheduler::CandidateSource;

/// Tasks kept in a map, stamped with the shared clock on update
#[derive(Debug)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
    clock: Arc<dyn Clock>,
}

impl MemoryTaskStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Insert or replace a task as-is, keeping its timestamps
    pub async fn insert(&self, task: Task) {
        self.tasks.write().await.insert(task.id, task);
    }

    /// Tasks of a workspace, oldest first
    pub async fn list_by_workspace(&self, workspace_id: &str) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|task| task.workspace_id == workspace_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|task| (task.created_at, task.id));
        tasks
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;
        task.apply(patch, self.clock.now_millis());
        Ok(task.clone())
    }
}

#[async_trait]
impl CandidateSource for MemoryTaskStore {
    async fn candidates(&self, integration: &Integration) -> Result<Vec<TaskId>> {
        Ok(self
            .list_by_workspace(&integration.workspace_id)
            .await
            .into_iter()
            .filter(|task| !task.archived)
            .map(|task| task.id)
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryIntegrationStore {
    integrations: RwLock<HashMap<IntegrationId, Integration>>,
}

impl MemoryIntegrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, integration: Integration) {
        self.integrations
            .write()
            .await
            .insert(integration.id, integration);
    }

    /// Toggle sync for an integration; returns false when it does not exist
    pub async fn set_enabled(&self, id: &IntegrationId, enabled: bool) -> bool {
        self.integrations
            .write()
            .await
            .get_mut(id)
            .map(|integration| integration.sync_enabled = enabled)
            .is_some()
    }
}

#[async_trait]
impl IntegrationStore for MemoryIntegrationStore {
    async fn get_integration(&self, id: &IntegrationId) -> Result<Option<Integration>> {
        Ok(self.integrations.read().await.get(id).cloned())
    }

    async fn list_integrations(&self) -> Result<Vec<Integration>> {
        let mut integrations: Vec<Integration> =
            self.integrations.read().await.values().cloned().collect();
        integrations.sort_by_key(|integration| integration.id);
        Ok(integrations)
    }

    async fn mark_synced(&self, id: &IntegrationId, at: i64) -> Result<()> {
        let mut integrations = self.integrations.write().await;
        let integration = integrations
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("integration {id}")))?;
        integration.last_sync_at = Some(at);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemorySyncMetadataStore {
    records: RwLock<HashMap<SyncKey, SyncMetadata>>,
    clock: Arc<dyn Clock>,
}

impl MemorySyncMetadataStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SyncMetadataStore for MemorySyncMetadataStore {
    async fn get(&self, key: SyncKey) -> Result<Option<SyncMetadata>> {
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn create(&self, metadata: &SyncMetadata) -> Result<SyncMetadata> {
        let mut records = self.records.write().await;
        let key = metadata.key();
        if records.contains_key(&key) {
            return Err(Error::AlreadyExists(format!("sync metadata {key}")));
        }
        records.insert(key, metadata.clone());
        Ok(metadata.clone())
    }

    async fn update(&self, key: SyncKey, patch: &SyncMetadataPatch) -> Result<SyncMetadata> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(format!("sync metadata {key}")))?;
        record.apply(patch, self.clock.now_millis());
        Ok(record.clone())
    }

    async fn list_by_status(&self, status: SyncStatus) -> Result<Vec<SyncMetadata>> {
        let mut records: Vec<SyncMetadata> = self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.sync_status == status)
            .cloned()
            .collect();
        records.sort_by_key(SyncMetadata::key);
        Ok(records)
    }
}

#[derive(Debug, Default)]
pub struct MemorySyncStatsStore {
    runs: RwLock<HashMap<IntegrationId, Vec<SyncRun>>>,
}

impl MemorySyncStatsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStatsStore for MemorySyncStatsStore {
    async fn record_run(&self, run: &SyncRun) -> Result<()> {
        self.runs
            .write()
            .await
            .entry(run.integration_id)
            .or_default()
            .push(run.clone());
        Ok(())
    }

    async fn statistics(&self, integration_id: &IntegrationId) -> Result<SyncStatistics> {
        let mut stats = SyncStatistics::default();
        if let Some(runs) = self.runs.read().await.get(integration_id) {
            runs.iter().for_each(|run| stats.record(run));
        }
        Ok(stats)
    }

    async fn history(&self, integration_id: &IntegrationId, limit: usize) -> Result<Vec<SyncRun>> {
        Ok(self
            .runs
            .read()
            .await
            .get(integration_id)
            .map(|runs| runs.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
