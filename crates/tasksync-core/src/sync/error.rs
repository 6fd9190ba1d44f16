//! Sync failure taxonomy

use std::time::Duration;

use thiserror::Error;

use crate::adapter::AdapterError;
use crate::models::{IntegrationId, Provider, SyncKey, TaskId};

pub type SyncResult<T> = Result<T, SyncError>;

/// Why a sync operation did not complete
#[derive(Debug, Error)]
pub enum SyncError {
    /// Sync is administratively off for this integration (or it is gone)
    #[error("Integration {0} is disabled or missing")]
    IntegrationDisabledOrMissing(IntegrationId),

    #[error("No adapter registered for provider {0}")]
    AdapterNotFound(Provider),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Pull needs an existing link to an external record
    #[error("Task {0} has no external record for this integration")]
    NotLinked(SyncKey),

    #[error("External task {external_id} not found")]
    ExternalNotFound { external_id: String },

    #[error("{message}")]
    ConflictDetected { key: SyncKey, message: String },

    #[error("Transient sync failure: {0}")]
    Transient(String),

    #[error("Sync operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("No conflict found for {0}")]
    NoConflictFound(SyncKey),

    #[error("Unsupported resolution strategy: {0}")]
    UnsupportedStrategy(String),

    #[error("Invalid resolution: {0}")]
    InvalidResolution(String),

    #[error("Adapter rejected the task: {0}")]
    Rejected(String),
}

impl SyncError {
    /// Whether the queue should schedule another attempt
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }

    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConflictDetected { .. })
    }

    /// Disabled integrations are skipped without counting as a failure
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::IntegrationDisabledOrMissing(_))
    }
}

impl From<AdapterError> for SyncError {
    fn from(error: AdapterError) -> Self {
        match error {
            AdapterError::NotFound(external_id) => Self::ExternalNotFound { external_id },
            error if error.is_transient() => Self::Transient(error.to_string()),
            error => Self::Rejected(error.to_string()),
        }
    }
}

impl From<crate::Error> for SyncError {
    fn from(error: crate::Error) -> Self {
        Self::Transient(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(SyncError::Transient("reset".into()).is_retryable());
        assert!(SyncError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!SyncError::AdapterNotFound(Provider::Notion).is_retryable());
        assert!(!SyncError::TaskNotFound(TaskId::new()).is_retryable());

        let conflict = SyncError::ConflictDetected {
            key: SyncKey::new(TaskId::new(), IntegrationId::new()),
            message: "Conflict detected during push".into(),
        };
        assert!(conflict.is_conflict());
        assert!(!conflict.is_retryable());
        assert_eq!(conflict.to_string(), "Conflict detected during push");
    }

    #[test]
    fn adapter_errors_map_by_kind() {
        assert!(matches!(
            SyncError::from(AdapterError::NotFound("ext-1".into())),
            SyncError::ExternalNotFound { .. }
        ));
        assert!(SyncError::from(AdapterError::Network("dns".into())).is_retryable());
        assert!(matches!(
            SyncError::from(AdapterError::Invalid("bad".into())),
            SyncError::Rejected(_)
        ));
    }

    #[test]
    fn timeout_message_uses_millis() {
        let error = SyncError::Timeout(Duration::from_secs(30));
        assert_eq!(error.to_string(), "Sync operation timed out after 30000ms");
    }
}
