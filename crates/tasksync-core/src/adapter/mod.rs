//! Provider adapters.
//!
//! An adapter translates between internal [`Task`]s and one external
//! provider's records. Adapters are registered once per [`Provider`] in an
//! [`AdapterRegistry`] and looked up by the integration's provider at sync
//! time.

mod local_file;
mod memory;
mod registry;

pub use local_file::LocalFileAdapter;
pub use memory::MemoryAdapter;
pub use registry::AdapterRegistry;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ConflictInfo, ExternalTask, Integration, Provider, Task, TaskPatch};
use crate::sync::ResolutionStrategy;

/// Errors reported by a provider adapter
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The external record does not exist
    #[error("External task not found: {0}")]
    NotFound(String),
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Provider API error: {0}")]
    Api(String),
    /// Data the provider cannot accept or that cannot be mapped
    #[error("Invalid external data: {0}")]
    Invalid(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdapterError {
    /// Whether retrying the same call later may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Network(_) | Self::Api(_) | Self::Io(_)
        )
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Result of a successful push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub external_id: String,
    /// Provider-side modification time after the write (Unix ms)
    pub last_modified: i64,
}

/// Capability set every provider implements
#[async_trait]
pub trait SyncAdapter: Send + Sync {
    /// Provider this adapter is registered under
    fn provider(&self) -> Provider;

    /// Create the external record when `external_id` is `None`, update it otherwise
    async fn push_task(
        &self,
        task: &Task,
        integration: &Integration,
        external_id: Option<&str>,
    ) -> AdapterResult<PushOutcome>;

    /// Fetch the external record. Missing records fail with `AdapterError::NotFound`.
    async fn pull_task(
        &self,
        external_id: &str,
        integration: &Integration,
    ) -> AdapterResult<ExternalTask>;

    /// Push several tasks, one result per input in order
    async fn push_batch(
        &self,
        tasks: &[(Task, Option<String>)],
        integration: &Integration,
    ) -> Vec<AdapterResult<PushOutcome>> {
        let mut results = Vec::with_capacity(tasks.len());
        for (task, external_id) in tasks {
            results.push(
                self.push_task(task, integration, external_id.as_deref())
                    .await,
            );
        }
        results
    }

    /// Pull several records, one result per input in order
    async fn pull_batch(
        &self,
        external_ids: &[String],
        integration: &Integration,
    ) -> Vec<AdapterResult<ExternalTask>> {
        let mut results = Vec::with_capacity(external_ids.len());
        for external_id in external_ids {
            results.push(self.pull_task(external_id, integration).await);
        }
        results
    }

    /// Draft of the external representation of a task
    fn map_to_external(&self, task: &Task) -> ExternalTask {
        ExternalTask {
            external_id: String::new(),
            title: task.title.clone(),
            content: task.content.clone(),
            status: Some(task.status),
            priority: task.priority,
            due_date: task.due_date,
            archived: task.archived,
            last_modified: task.updated_at,
            url: None,
            properties: serde_json::Value::Null,
        }
    }

    /// Internal fields to apply for an external snapshot.
    ///
    /// A status the provider could not express is left untouched.
    fn map_from_external(&self, external: &ExternalTask) -> TaskPatch {
        TaskPatch {
            title: Some(external.title.clone()),
            content: Some(external.content.clone()),
            status: external.status,
            priority: Some(external.priority),
            due_date: Some(external.due_date),
            archived: Some(external.archived),
        }
    }

    /// Task version that should win under `strategy`
    async fn resolve_conflict(
        &self,
        conflict: &ConflictInfo,
        strategy: ResolutionStrategy,
    ) -> AdapterResult<Task> {
        let mut resolved = conflict.internal.clone();
        if strategy == ResolutionStrategy::ExternalWins {
            let patch = self.map_from_external(&conflict.external);
            resolved.apply(&patch, conflict.external.last_modified);
        }
        Ok(resolved)
    }
}
