use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tasksync_core::adapter::{AdapterRegistry, LocalFileAdapter};
use tasksync_core::clock::SystemClock;
use tasksync_core::config::SyncSettings;
use tasksync_core::models::{Integration, SyncMetadata, SyncSummary, Task};
use tasksync_core::services::DatabaseService;
use tasksync_core::store::TaskStore;
use tasksync_core::sync::SyncEngine;
use tasksync_core::util::format_millis;
use tasksync_core::{IntegrationId, TaskId};

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct TaskListItem {
    pub id: String,
    pub title: String,
    pub status: String,
    pub archived: bool,
    pub updated_at: i64,
    pub relative_time: String,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_db_path {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("tasksync").join("tasksync.db"))
        .ok_or(CliError::NoDataDir)
}

pub async fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(DatabaseService::open_path(path.to_path_buf()).await?)
}

/// Defaults, then the optional JSON file, then `TASKSYNC_*` variables
pub fn load_settings(config_path: Option<&Path>) -> Result<SyncSettings, CliError> {
    let settings = match config_path {
        Some(path) => {
            let payload = std::fs::read_to_string(path).map_err(|error| {
                CliError::Config(format!("cannot read {}: {error}", path.display()))
            })?;
            SyncSettings::from_json(&payload)?
        }
        None => SyncSettings::default(),
    };
    let settings = settings.with_env_overrides()?;
    settings.validate()?;
    Ok(settings)
}

/// Engine over the local database with every adapter this binary ships
pub fn build_engine(db: &DatabaseService, settings: SyncSettings) -> Arc<SyncEngine> {
    let store = Arc::new(db.clone());
    let adapters = AdapterRegistry::new().with_adapter(Arc::new(LocalFileAdapter::new(
        Arc::new(SystemClock),
    )));
    Arc::new(SyncEngine::new(store.clone(), store.clone(), store, adapters).with_settings(settings))
}

pub fn parse_task_id(value: &str) -> Result<TaskId, CliError> {
    value.trim().parse().map_err(|_| CliError::InvalidId {
        kind: "task",
        value: value.to_string(),
    })
}

pub fn parse_integration_id(value: &str) -> Result<IntegrationId, CliError> {
    value.trim().parse().map_err(|_| CliError::InvalidId {
        kind: "integration",
        value: value.to_string(),
    })
}

pub async fn load_task(db: &DatabaseService, id: &str) -> Result<Task, CliError> {
    let task_id = parse_task_id(id)?;
    db.get_task(&task_id)
        .await?
        .ok_or_else(|| CliError::TaskNotFound(id.to_string()))
}

pub fn normalize_title(parts: &[String]) -> Result<String, CliError> {
    let title = parts.join(" ");
    let title = title.trim();
    if title.is_empty() {
        return Err(CliError::EmptyTitle);
    }
    Ok(title.to_string())
}

pub fn task_to_list_item(task: &Task) -> TaskListItem {
    TaskListItem {
        id: task.id.to_string(),
        title: task.title.clone(),
        status: task.status.to_string(),
        archived: task.archived,
        updated_at: task.updated_at,
        relative_time: format_relative_time(task.updated_at, Utc::now().timestamp_millis()),
    }
}

pub fn format_task_lines(tasks: &[Task]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    tasks
        .iter()
        .map(|task| {
            let id = task.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let archived = if task.archived { " [archived]" } else { "" };
            format!(
                "{short_id}  {:<11}  {}{archived}  ({})",
                task.status.as_str(),
                task.title,
                format_relative_time(task.updated_at, now_ms)
            )
        })
        .collect()
}

pub fn format_integration_lines(integrations: &[Integration]) -> Vec<String> {
    integrations
        .iter()
        .map(|integration| {
            let state = if integration.sync_enabled {
                "enabled"
            } else {
                "disabled"
            };
            format!(
                "{}  {:<10}  {:<8}  {}  last sync {}",
                integration.id,
                integration.provider.as_str(),
                state,
                integration.external_id,
                format_millis(integration.last_sync_at)
            )
        })
        .collect()
}

pub fn format_summary(summary: &SyncSummary) -> String {
    format!(
        "processed {}, succeeded {}, failed {}, conflicts {}",
        summary.processed, summary.succeeded, summary.failed, summary.conflicts
    )
}

pub fn format_metadata_lines(metadata: &SyncMetadata) -> Vec<String> {
    let mut lines = vec![
        format!("status:        {}", metadata.sync_status),
        format!(
            "external id:   {}",
            metadata.external_id.as_deref().unwrap_or("-")
        ),
        format!("last sync:     {}", format_millis(metadata.last_sync_at)),
        format!(
            "external edit: {}",
            format_millis(metadata.last_external_update)
        ),
        format!("retries:       {}", metadata.retry_count),
    ];
    if let Some(error) = &metadata.last_error {
        lines.push(format!("last error:    {error}"));
    }
    lines
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}
