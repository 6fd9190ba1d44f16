//! Local directory provider.
//!
//! Each external task is a JSON document `<dir>/<id>.json`, where `<dir>` is the
//! integration's `external_id`. The document shape is this provider's own:
//! human-readable state labels, numeric priorities (1 = urgent .. 4 = low) and
//! RFC 3339 timestamps. Unknown keys written by other tools are preserved.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AdapterError, AdapterResult, PushOutcome, SyncAdapter};
use crate::clock::Clock;
use crate::models::{ExternalTask, Integration, Provider, Task, TaskPriority, TaskStatus};

const STATE_LABELS: [(TaskStatus, &str); 5] = [
    (TaskStatus::Todo, "Not started"),
    (TaskStatus::InProgress, "In progress"),
    (TaskStatus::Blocked, "Blocked"),
    (TaskStatus::Done, "Done"),
    (TaskStatus::Cancelled, "Cancelled"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileRecord {
    id: String,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    priority: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    due: Option<String>,
    #[serde(default)]
    archived: bool,
    updated_at: String,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Adapter for [`Provider::LocalFile`]
#[derive(Debug)]
pub struct LocalFileAdapter {
    clock: Arc<dyn Clock>,
}

impl LocalFileAdapter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn directory(integration: &Integration) -> AdapterResult<PathBuf> {
        let dir = integration.external_id.trim();
        if dir.is_empty() {
            return Err(AdapterError::Invalid(
                "local_file integration needs a directory as external id".to_string(),
            ));
        }
        Ok(PathBuf::from(dir))
    }

    fn record_path(dir: &Path, external_id: &str) -> AdapterResult<PathBuf> {
        let valid = !external_id.is_empty()
            && external_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AdapterError::Invalid(format!(
                "invalid external id: {external_id}"
            )));
        }
        Ok(dir.join(format!("{external_id}.json")))
    }

    async fn read_record(path: &Path, external_id: &str) -> AdapterResult<FileRecord> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                Err(AdapterError::NotFound(external_id.to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn write_record(path: &Path, record: &FileRecord) -> AdapterResult<()> {
        let payload = serde_json::to_vec_pretty(record)?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, payload).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl SyncAdapter for LocalFileAdapter {
    fn provider(&self) -> Provider {
        Provider::LocalFile
    }

    async fn push_task(
        &self,
        task: &Task,
        integration: &Integration,
        external_id: Option<&str>,
    ) -> AdapterResult<PushOutcome> {
        let dir = Self::directory(integration)?;
        tokio::fs::create_dir_all(&dir).await?;

        let now = self.clock.now_millis();
        let (path, mut record) = if let Some(external_id) = external_id {
            let path = Self::record_path(&dir, external_id)?;
            let record = Self::read_record(&path, external_id).await?;
            (path, record)
        } else {
            let external_id = Uuid::now_v7().simple().to_string();
            let path = Self::record_path(&dir, &external_id)?;
            let record = FileRecord {
                id: external_id,
                title: String::new(),
                body: None,
                state: String::new(),
                priority: None,
                due: None,
                archived: false,
                updated_at: String::new(),
                extra: serde_json::Map::new(),
            };
            (path, record)
        };

        fill_record(&mut record, task, now);
        record
            .extra
            .insert("taskId".to_string(), task.id.as_str().into());
        Self::write_record(&path, &record).await?;

        tracing::debug!(
            task_id = %task.id,
            external_id = %record.id,
            path = %path.display(),
            "Wrote local task file"
        );
        Ok(PushOutcome {
            external_id: record.id,
            last_modified: now,
        })
    }

    async fn pull_task(
        &self,
        external_id: &str,
        integration: &Integration,
    ) -> AdapterResult<ExternalTask> {
        let dir = Self::directory(integration)?;
        let path = Self::record_path(&dir, external_id)?;
        let record = Self::read_record(&path, external_id).await?;
        record_to_external(record, &path)
    }

    /// Reads the directory once instead of opening files one by one
    async fn pull_batch(
        &self,
        external_ids: &[String],
        integration: &Integration,
    ) -> Vec<AdapterResult<ExternalTask>> {
        let found = match scan_directory(integration).await {
            Ok(found) => found,
            Err(error) => {
                let message = error.to_string();
                return external_ids
                    .iter()
                    .map(|_| Err(AdapterError::Api(message.clone())))
                    .collect();
            }
        };

        external_ids
            .iter()
            .map(|external_id| {
                found.get(external_id).map_or_else(
                    || Err(AdapterError::NotFound(external_id.clone())),
                    |(record, path)| record_to_external(record.clone(), path),
                )
            })
            .collect()
    }
}

async fn scan_directory(
    integration: &Integration,
) -> AdapterResult<HashMap<String, (FileRecord, PathBuf)>> {
    let dir = LocalFileAdapter::directory(integration)?;
    let mut found = HashMap::new();
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(found),
        Err(error) => return Err(error.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let bytes = tokio::fs::read(&path).await?;
        match serde_json::from_slice::<FileRecord>(&bytes) {
            Ok(record) => {
                found.insert(record.id.clone(), (record, path));
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "Skipping unreadable task file");
            }
        }
    }
    Ok(found)
}

fn fill_record(record: &mut FileRecord, task: &Task, now: i64) {
    record.title.clone_from(&task.title);
    record.body.clone_from(&task.content);
    record.state = state_label(task.status).to_string();
    record.priority = task.priority.map(priority_rank);
    record.due = task.due_date.and_then(format_timestamp);
    record.archived = task.archived;
    record.updated_at = format_timestamp(now).unwrap_or_default();
}

fn record_to_external(record: FileRecord, path: &Path) -> AdapterResult<ExternalTask> {
    let last_modified = parse_timestamp(&record.updated_at)?;
    let due_date = record.due.as_deref().map(parse_timestamp).transpose()?;
    let priority = match record.priority {
        Some(rank) => Some(priority_from_rank(rank).ok_or_else(|| {
            AdapterError::Invalid(format!("priority out of range: {rank}"))
        })?),
        None => None,
    };

    Ok(ExternalTask {
        external_id: record.id,
        title: record.title,
        content: record.body,
        status: status_from_label(&record.state),
        priority,
        due_date,
        archived: record.archived,
        last_modified,
        url: Some(format!("file://{}", path.display())),
        properties: serde_json::Value::Object(record.extra),
    })
}

fn state_label(status: TaskStatus) -> &'static str {
    STATE_LABELS
        .iter()
        .find(|(candidate, _)| *candidate == status)
        .map_or("Not started", |(_, label)| *label)
}

fn status_from_label(label: &str) -> Option<TaskStatus> {
    STATE_LABELS
        .iter()
        .find(|(_, candidate)| candidate.eq_ignore_ascii_case(label.trim()))
        .map(|(status, _)| *status)
}

const fn priority_rank(priority: TaskPriority) -> u8 {
    match priority {
        TaskPriority::Urgent => 1,
        TaskPriority::High => 2,
        TaskPriority::Medium => 3,
        TaskPriority::Low => 4,
    }
}

const fn priority_from_rank(rank: u8) -> Option<TaskPriority> {
    match rank {
        1 => Some(TaskPriority::Urgent),
        2 => Some(TaskPriority::High),
        3 => Some(TaskPriority::Medium),
        4 => Some(TaskPriority::Low),
        _ => None,
    }
}

fn format_timestamp(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|at| at.to_rfc3339())
}

fn parse_timestamp(value: &str) -> AdapterResult<i64> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.timestamp_millis())
        .map_err(|error| AdapterError::Invalid(format!("bad timestamp {value:?}: {error}")))
}
