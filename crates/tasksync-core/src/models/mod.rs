//! Data models for tasksync

mod conflict;
mod external;
mod integration;
mod stats;
mod sync_metadata;
mod task;

pub use conflict::{ConflictInfo, FieldDifference};
pub use external::ExternalTask;
pub use integration::{Integration, IntegrationConfig, IntegrationId, Provider};
pub use stats::{SyncRun, SyncStatistics, SyncSummary};
pub use sync_metadata::{SyncKey, SyncMetadata, SyncMetadataPatch, SyncStatus};
pub use task::{Task, TaskId, TaskPatch, TaskPriority, TaskStatus};
