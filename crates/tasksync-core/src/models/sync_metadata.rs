//! Sync metadata model
//!
//! One record binds a task to one integration and tracks the pair's sync
//! state machine: `pending -> synced | error | conflict`, with `conflict`
//! only left through explicit resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{IntegrationId, TaskId};
use crate::error::Error;

/// Composite key of a sync metadata record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncKey {
    pub task_id: TaskId,
    pub integration_id: IntegrationId,
}

impl SyncKey {
    pub const fn new(task_id: TaskId, integration_id: IntegrationId) -> Self {
        Self {
            task_id,
            integration_id,
        }
    }
}

impl fmt::Display for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.task_id, self.integration_id)
    }
}

/// Sync state of a task/integration pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
    Conflict,
    Error,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Conflict => "conflict",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "conflict" => Ok(Self::Conflict),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidInput(format!("unknown sync status: {other}"))),
        }
    }
}

/// Persistent binding of one task to one integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub task_id: TaskId,
    pub integration_id: IntegrationId,
    /// Provider-side identifier, once the task has been pushed
    pub external_id: Option<String>,
    pub sync_status: SyncStatus,
    /// Last confirmed sync (Unix ms)
    pub last_sync_at: Option<i64>,
    /// External modification time seen at the last sync (Unix ms)
    pub last_external_update: Option<i64>,
    /// Consecutive failed attempts
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SyncMetadata {
    /// A fresh `pending` record for the pair
    #[must_use]
    pub const fn new(key: SyncKey, now: i64) -> Self {
        Self {
            task_id: key.task_id,
            integration_id: key.integration_id,
            external_id: None,
            sync_status: SyncStatus::Pending,
            last_sync_at: None,
            last_external_update: None,
            retry_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub const fn key(&self) -> SyncKey {
        SyncKey::new(self.task_id, self.integration_id)
    }

    /// Apply a partial update, stamping `updated_at`
    pub fn apply(&mut self, patch: &SyncMetadataPatch, now: i64) {
        if let Some(external_id) = &patch.external_id {
            self.external_id.clone_from(external_id);
        }
        if let Some(status) = patch.sync_status {
            self.sync_status = status;
        }
        if let Some(last_sync_at) = patch.last_sync_at {
            self.last_sync_at = last_sync_at;
        }
        if let Some(last_external_update) = patch.last_external_update {
            self.last_external_update = last_external_update;
        }
        if let Some(retry_count) = patch.retry_count {
            self.retry_count = retry_count;
        }
        if let Some(last_error) = &patch.last_error {
            self.last_error.clone_from(last_error);
        }
        self.updated_at = now;
    }
}

/// Partial sync metadata fields; `Some(None)` clears a nullable field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncMetadataPatch {
    pub external_id: Option<Option<String>>,
    pub sync_status: Option<SyncStatus>,
    pub last_sync_at: Option<Option<i64>>,
    pub last_external_update: Option<Option<i64>>,
    pub retry_count: Option<u32>,
    pub last_error: Option<Option<String>>,
}

impl SyncMetadataPatch {
    /// Successful sync: `synced`, retry counter reset, error cleared
    #[must_use]
    pub fn synced(now: i64, last_external_update: Option<i64>) -> Self {
        Self {
            sync_status: Some(SyncStatus::Synced),
            last_sync_at: Some(Some(now)),
            last_external_update: Some(last_external_update),
            retry_count: Some(0),
            last_error: Some(None),
            ..Self::default()
        }
    }

    /// Failed sync attempt
    #[must_use]
    pub fn failed(retry_count: u32, message: impl Into<String>) -> Self {
        Self {
            sync_status: Some(SyncStatus::Error),
            retry_count: Some(retry_count),
            last_error: Some(Some(message.into())),
            ..Self::default()
        }
    }

    /// Conflict detected
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            sync_status: Some(SyncStatus::Conflict),
            last_error: Some(Some(message.into())),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(Some(external_id.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key() -> SyncKey {
        SyncKey::new(TaskId::new(), IntegrationId::new())
    }

    #[test]
    fn test_new_metadata_is_pending() {
        let metadata = SyncMetadata::new(key(), 10);
        assert_eq!(metadata.sync_status, SyncStatus::Pending);
        assert_eq!(metadata.retry_count, 0);
        assert_eq!(metadata.last_sync_at, None);
    }

    #[test]
    fn test_synced_patch_resets_failure_state() {
        let mut metadata = SyncMetadata::new(key(), 10);
        metadata.apply(&SyncMetadataPatch::failed(2, "timeout"), 20);
        assert_eq!(metadata.sync_status, SyncStatus::Error);
        assert_eq!(metadata.retry_count, 2);

        metadata.apply(
            &SyncMetadataPatch::synced(30, Some(25)).with_external_id("ext-1"),
            30,
        );
        assert_eq!(metadata.sync_status, SyncStatus::Synced);
        assert_eq!(metadata.retry_count, 0);
        assert_eq!(metadata.last_error, None);
        assert_eq!(metadata.last_sync_at, Some(30));
        assert_eq!(metadata.last_external_update, Some(25));
        assert_eq!(metadata.external_id.as_deref(), Some("ext-1"));
        assert_eq!(metadata.updated_at, 30);
    }

    #[test]
    fn test_conflict_patch_keeps_sync_times() {
        let mut metadata = SyncMetadata::new(key(), 10);
        metadata.apply(&SyncMetadataPatch::synced(15, Some(12)), 15);
        metadata.apply(&SyncMetadataPatch::conflict("both changed"), 40);
        assert_eq!(metadata.sync_status, SyncStatus::Conflict);
        assert_eq!(metadata.last_sync_at, Some(15));
        assert_eq!(metadata.last_error.as_deref(), Some("both changed"));
    }

    #[test]
    fn test_status_parse() {
        for status in [
            SyncStatus::Pending,
            SyncStatus::Synced,
            SyncStatus::Conflict,
            SyncStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("stale".parse::<SyncStatus>().is_err());
    }
}
