//! Conflict resolution strategies

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{SyncError, SyncResult};
use crate::adapter::SyncAdapter;
use crate::models::{ConflictInfo, Integration, Task, TaskPatch};
use crate::store::TaskStore;

/// Which side wins a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Keep the internal task and overwrite the external record
    InternalWins,
    /// Take the external record into the internal task
    ExternalWins,
    /// Apply caller-supplied merged fields to both sides
    Manual,
}

impl ResolutionStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InternalWins => "internal-wins",
            Self::ExternalWins => "external-wins",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionStrategy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "internal-wins" => Ok(Self::InternalWins),
            "external-wins" => Ok(Self::ExternalWins),
            "manual" => Ok(Self::Manual),
            _ => Err(SyncError::UnsupportedStrategy(s.to_string())),
        }
    }
}

/// A caller's decision for one conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub strategy: ResolutionStrategy,
    /// Merged fields, required for [`ResolutionStrategy::Manual`]
    pub merged: Option<TaskPatch>,
}

impl Resolution {
    pub const fn internal_wins() -> Self {
        Self {
            strategy: ResolutionStrategy::InternalWins,
            merged: None,
        }
    }

    pub const fn external_wins() -> Self {
        Self {
            strategy: ResolutionStrategy::ExternalWins,
            merged: None,
        }
    }

    pub const fn manual(merged: TaskPatch) -> Self {
        Self {
            strategy: ResolutionStrategy::Manual,
            merged: Some(merged),
        }
    }

    /// Build a resolution from a strategy name
    pub fn parse(strategy: &str, merged: Option<TaskPatch>) -> SyncResult<Self> {
        Ok(Self {
            strategy: strategy.parse()?,
            merged,
        })
    }
}

/// Outcome of applying a resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Final internal task
    pub task: Task,
    /// Newest known external modification time
    pub last_external_update: i64,
}

/// Applies a [`Resolution`] through the adapter and the task store
pub struct ConflictResolver<'a> {
    adapter: &'a dyn SyncAdapter,
    tasks: &'a dyn TaskStore,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(adapter: &'a dyn SyncAdapter, tasks: &'a dyn TaskStore) -> Self {
        Self { adapter, tasks }
    }

    pub async fn apply(
        &self,
        conflict: &ConflictInfo,
        integration: &Integration,
        resolution: &Resolution,
    ) -> SyncResult<Resolved> {
        let external_id = conflict.external.external_id.as_str();

        match resolution.strategy {
            ResolutionStrategy::InternalWins => {
                let resolved = self
                    .adapter
                    .resolve_conflict(conflict, ResolutionStrategy::InternalWins)
                    .await?;
                let pushed = self
                    .adapter
                    .push_task(&resolved, integration, Some(external_id))
                    .await?;
                Ok(Resolved {
                    task: resolved,
                    last_external_update: pushed.last_modified,
                })
            }
            ResolutionStrategy::ExternalWins => {
                let patch = self.adapter.map_from_external(&conflict.external);
                let task = self.update_task(conflict, &patch).await?;
                Ok(Resolved {
                    task,
                    last_external_update: conflict.external.last_modified,
                })
            }
            ResolutionStrategy::Manual => {
                let merged = resolution
                    .merged
                    .as_ref()
                    .filter(|patch| !patch.is_empty())
                    .ok_or_else(|| {
                        SyncError::InvalidResolution(
                            "manual resolution requires merged fields".to_string(),
                        )
                    })?;
                let task = self.update_task(conflict, merged).await?;
                let pushed = self
                    .adapter
                    .push_task(&task, integration, Some(external_id))
                    .await?;
                Ok(Resolved {
                    task,
                    last_external_update: pushed.last_modified,
                })
            }
        }
    }

    async fn update_task(&self, conflict: &ConflictInfo, patch: &TaskPatch) -> SyncResult<Task> {
        self.tasks
            .update_task(&conflict.task_id, patch)
            .await
            .map_err(|error| match error {
                crate::Error::NotFound(_) => SyncError::TaskNotFound(conflict.task_id),
                other => other.into(),
            })
    }
}
