//! Conflict detection.
//!
//! A conflict exists when both sides changed after the last confirmed sync.
//! Without a confirmed sync there is nothing to compare against.

use serde_json::{json, Value};

use crate::models::{ConflictInfo, ExternalTask, FieldDifference, SyncMetadata, Task};

/// Whether `internal` and `external` both changed since `metadata.last_sync_at`
pub fn detect(internal: &Task, external: &ExternalTask, metadata: &SyncMetadata) -> bool {
    let Some(last_sync_at) = metadata.last_sync_at else {
        return false;
    };
    internal.updated_at > last_sync_at && external.last_modified > last_sync_at
}

/// Per-field differences between the two snapshots.
///
/// A status the provider could not express (`None`) is not reported.
pub fn field_differences(internal: &Task, external: &ExternalTask) -> Vec<FieldDifference> {
    let mut differences = Vec::new();
    let mut compare = |field: &str, ours: Value, theirs: Value| {
        if ours != theirs {
            differences.push(FieldDifference {
                field: field.to_string(),
                internal: ours,
                external: theirs,
            });
        }
    };

    compare("title", json!(internal.title), json!(external.title));
    compare("content", json!(internal.content), json!(external.content));
    if let Some(status) = external.status {
        compare("status", json!(internal.status), json!(status));
    }
    compare("priority", json!(internal.priority), json!(external.priority));
    compare("due_date", json!(internal.due_date), json!(external.due_date));
    compare("archived", json!(internal.archived), json!(external.archived));

    differences
}

/// Full conflict report, or `None` when the snapshots do not conflict
pub fn conflict_info(
    internal: &Task,
    external: &ExternalTask,
    metadata: &SyncMetadata,
) -> Option<ConflictInfo> {
    detect(internal, external, metadata).then(|| ConflictInfo {
        task_id: internal.id,
        integration_id: metadata.integration_id,
        internal: internal.clone(),
        external: external.clone(),
        differences: field_differences(internal, external),
    })
}
