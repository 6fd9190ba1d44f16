//! Provider-neutral snapshot of an external task

use serde::{Deserialize, Serialize};

use super::{TaskPriority, TaskStatus};

/// A task as seen by an external provider, after adapter mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalTask {
    /// Provider-side identifier; empty for drafts not yet created remotely
    pub external_id: String,
    pub title: String,
    pub content: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// Due date (Unix ms)
    pub due_date: Option<i64>,
    pub archived: bool,
    /// Last modification on the provider side (Unix ms)
    pub last_modified: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Raw provider-specific fields not covered above
    #[serde(default)]
    pub properties: serde_json::Value,
}
