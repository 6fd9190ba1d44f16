//! Conflict model

use serde::{Deserialize, Serialize};

use super::{ExternalTask, IntegrationId, Task, TaskId};

/// One field whose value differs between the two sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDifference {
    /// Task field name (`title`, `content`, ...)
    pub field: String,
    pub internal: serde_json::Value,
    pub external: serde_json::Value,
}

/// Both sides of a task changed since the last confirmed sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub task_id: TaskId,
    pub integration_id: IntegrationId,
    /// Internal snapshot at detection time
    pub internal: Task,
    /// External snapshot at detection time
    pub external: ExternalTask,
    pub differences: Vec<FieldDifference>,
}

impl ConflictInfo {
    /// Whether the named field differs
    pub fn differs_in(&self, field: &str) -> bool {
        self.differences.iter().any(|diff| diff.field == field)
    }
}
