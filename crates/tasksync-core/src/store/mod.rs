//! Collaborator contracts consumed by the sync engine.
//!
//! The engine only talks to these traits. Reference implementations live in
//! [`memory`] and in [`crate::services::DatabaseService`] (libSQL).

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Integration, IntegrationId, SyncKey, SyncMetadata, SyncMetadataPatch, SyncRun,
    SyncStatistics, SyncStatus, Task, TaskId, TaskPatch,
};

/// Read and partially update internal tasks
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Apply a partial update and return the refreshed task.
    ///
    /// Fails with `Error::NotFound` when the task does not exist.
    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task>;
}

/// Integration lookup plus sync bookkeeping
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn get_integration(&self, id: &IntegrationId) -> Result<Option<Integration>>;

    async fn list_integrations(&self) -> Result<Vec<Integration>>;

    /// Record the completion time of a sync run
    async fn mark_synced(&self, id: &IntegrationId, at: i64) -> Result<()>;
}

/// Persistent sync metadata, one record per (task, integration) pair
#[async_trait]
pub trait SyncMetadataStore: Send + Sync {
    async fn get(&self, key: SyncKey) -> Result<Option<SyncMetadata>>;

    /// Insert a new record. Fails with `Error::AlreadyExists` if the key is taken.
    async fn create(&self, metadata: &SyncMetadata) -> Result<SyncMetadata>;

    /// Patch an existing record. Fails with `Error::NotFound` if the key is absent.
    async fn update(&self, key: SyncKey, patch: &SyncMetadataPatch) -> Result<SyncMetadata>;

    async fn list_by_status(&self, status: SyncStatus) -> Result<Vec<SyncMetadata>>;
}

/// Per-integration run history, for observability only
#[async_trait]
pub trait SyncStatsStore: Send + Sync {
    async fn record_run(&self, run: &SyncRun) -> Result<()>;

    async fn statistics(&self, integration_id: &IntegrationId) -> Result<SyncStatistics>;

    /// Most recent runs first
    async fn history(&self, integration_id: &IntegrationId, limit: usize) -> Result<Vec<SyncRun>>;
}
