//! Shared database service wrapper used by the engine and the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::db::{
    Database, LibSqlIntegrationRepository, LibSqlSyncMetadataRepository,
    LibSqlSyncStatsRepository, LibSqlTaskRepository,
};
use crate::models::{
    Integration, IntegrationId, SyncKey, SyncMetadata, SyncMetadataPatch, SyncRun,
    SyncStatistics, SyncStatus, Task, TaskId, TaskPatch,
};
use crate::scheduler::CandidateSource;
use crate::store::{IntegrationStore, SyncMetadataStore, SyncStatsStore, TaskStore};
use crate::Result;

/// Thread-safe service for DB and repository operations.
///
/// Implements every store contract the sync engine consumes, so one clone can
/// be handed to the engine for all of them.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseService")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and a fresh one created.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Detected invalid local DB file at {}: {}. Moving it aside and retrying once.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };
        Ok(Self::from_database(db))
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::from_database(db))
    }

    fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Stamp writes with `clock` instead of the system time
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };

        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));
            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if file_name.to_string_lossy().starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale DB sidecar file {}", path.display());
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Create a task in a workspace, stamped with the service clock.
    pub async fn create_task(&self, workspace_id: &str, title: &str) -> Result<Task> {
        self.insert_task(&Task::new_at(workspace_id, title, self.clock.now_millis()))
            .await
    }

    /// Insert a fully built task.
    pub async fn insert_task(&self, task: &Task) -> Result<Task> {
        if task.title.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "task title cannot be empty".to_string(),
            ));
        }
        let db = self.db.lock().await;
        LibSqlTaskRepository::new(db.connection()).create(task).await
    }

    /// List tasks of a workspace, oldest first.
    pub async fn list_tasks(&self, workspace_id: &str, include_archived: bool) -> Result<Vec<Task>> {
        let db = self.db.lock().await;
        LibSqlTaskRepository::new(db.connection())
            .list_by_workspace(workspace_id, include_archived)
            .await
    }

    // -----------------------------------------------------------------------
    // Integrations
    // -----------------------------------------------------------------------

    /// Register a new integration.
    pub async fn create_integration(&self, integration: &Integration) -> Result<Integration> {
        if integration.external_id.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "integration external id cannot be empty".to_string(),
            ));
        }
        let db = self.db.lock().await;
        LibSqlIntegrationRepository::new(db.connection())
            .create(integration)
            .await
    }

    /// List integrations, optionally limited to one workspace.
    pub async fn list_workspace_integrations(
        &self,
        workspace_id: Option<&str>,
    ) -> Result<Vec<Integration>> {
        let db = self.db.lock().await;
        LibSqlIntegrationRepository::new(db.connection())
            .list(workspace_id)
            .await
    }

    /// Turn sync on or off for an integration.
    pub async fn set_integration_enabled(&self, id: &IntegrationId, enabled: bool) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlIntegrationRepository::new(db.connection())
            .set_enabled(id, enabled)
            .await
    }
}

#[async_trait]
impl TaskStore for DatabaseService {
    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let db = self.db.lock().await;
        LibSqlTaskRepository::new(db.connection()).get(id).await
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task> {
        let db = self.db.lock().await;
        LibSqlTaskRepository::new(db.connection())
            .update(id, patch, self.clock.now_millis())
            .await
    }
}

#[async_trait]
impl IntegrationStore for DatabaseService {
    async fn get_integration(&self, id: &IntegrationId) -> Result<Option<Integration>> {
        let db = self.db.lock().await;
        LibSqlIntegrationRepository::new(db.connection())
            .get(id)
            .await
    }

    async fn list_integrations(&self) -> Result<Vec<Integration>> {
        self.list_workspace_integrations(None).await
    }

    async fn mark_synced(&self, id: &IntegrationId, at: i64) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlIntegrationRepository::new(db.connection())
            .mark_synced(id, at)
            .await
    }
}

#[async_trait]
impl SyncMetadataStore for DatabaseService {
    async fn get(&self, key: SyncKey) -> Result<Option<SyncMetadata>> {
        let db = self.db.lock().await;
        LibSqlSyncMetadataRepository::new(db.connection())
            .get(key)
            .await
    }

    async fn create(&self, metadata: &SyncMetadata) -> Result<SyncMetadata> {
        let db = self.db.lock().await;
        LibSqlSyncMetadataRepository::new(db.connection())
            .create(metadata)
            .await
    }

    async fn update(&self, key: SyncKey, patch: &SyncMetadataPatch) -> Result<SyncMetadata> {
        let db = self.db.lock().await;
        LibSqlSyncMetadataRepository::new(db.connection())
            .update(key, patch, self.clock.now_millis())
            .await
    }

    async fn list_by_status(&self, status: SyncStatus) -> Result<Vec<SyncMetadata>> {
        let db = self.db.lock().await;
        LibSqlSyncMetadataRepository::new(db.connection())
            .list_by_status(status)
            .await
    }
}

#[async_trait]
impl SyncStatsStore for DatabaseService {
    async fn record_run(&self, run: &SyncRun) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSyncStatsRepository::new(db.connection())
            .record_run(run)
            .await
    }

    async fn statistics(&self, integration_id: &IntegrationId) -> Result<SyncStatistics> {
        let db = self.db.lock().await;
        LibSqlSyncStatsRepository::new(db.connection())
            .statistics(integration_id)
            .await
    }

    async fn history(&self, integration_id: &IntegrationId, limit: usize) -> Result<Vec<SyncRun>> {
        let db = self.db.lock().await;
        LibSqlSyncStatsRepository::new(db.connection())
            .history(integration_id, limit)
            .await
    }
}

#[async_trait]
impl CandidateSource for DatabaseService {
    /// Every non-archived task of the integration's workspace
    async fn candidates(&self, integration: &Integration) -> Result<Vec<TaskId>> {
        Ok(self
            .list_tasks(&integration.workspace_id, false)
            .await?
            .into_iter()
            .map(|task| task.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::Provider;
    use pretty_assertions::assert_eq;

    async fn service() -> DatabaseService {
        DatabaseService::open_in_memory()
            .await
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(5_000)))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_task_uses_service_clock() {
        let service = service().await;
        let task = service.create_task("ws", "Plan").await.unwrap();
        assert_eq!(task.created_at, 5_000);

        let fetched = service.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(fetched, task);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_title_is_rejected() {
        let service = service().await;
        let result = service.create_task("ws", "   ").await;
        assert!(matches!(result, Err(crate::Error::InvalidInput(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn candidates_skip_archived_tasks() {
        let service = service().await;
        let integration = service
            .create_integration(&Integration::new("ws", Provider::Memory, "board"))
            .await
            .unwrap();
        let active = service.create_task("ws", "Active").await.unwrap();
        let old = service.create_task("ws", "Old").await.unwrap();
        service
            .update_task(
                &old.id,
                &TaskPatch {
                    archived: Some(true),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();
        service.create_task("other", "Elsewhere").await.unwrap();

        let candidates = service.candidates(&integration).await.unwrap();
        assert_eq!(candidates, vec![active.id]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn metadata_update_stamps_service_clock() {
        let service = service().await;
        let task = service.create_task("ws", "Linked").await.unwrap();
        let integration = service
            .create_integration(&Integration::new("ws", Provider::Memory, "board"))
            .await
            .unwrap();
        let key = SyncKey::new(task.id, integration.id);

        SyncMetadataStore::create(&service, &SyncMetadata::new(key, 1_000))
            .await
            .unwrap();
        let updated = SyncMetadataStore::update(&service, key, &SyncMetadataPatch::conflict("x"))
            .await
            .unwrap();
        assert_eq!(updated.updated_at, 5_000);
        assert_eq!(updated.sync_status, SyncStatus::Conflict);
    }

    #[test]
    fn detects_corrupted_db_errors() {
        assert!(DatabaseService::is_corrupted_db_error(
            &crate::Error::Database("SQLite failure: file is not a database".to_string())
        ));
        assert!(!DatabaseService::is_corrupted_db_error(
            &crate::Error::InvalidInput("task title cannot be empty".to_string())
        ));
    }

    #[test]
    fn quarantine_moves_db_and_removes_sidecars() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("tasksync.db");
        let wal_path = tmp.path().join("tasksync.db-wal");
        let shm_path = tmp.path().join("tasksync.db-shm");

        std::fs::write(&db_path, b"bad-db").unwrap();
        std::fs::write(&wal_path, b"wal").unwrap();
        std::fs::write(&shm_path, b"shm").unwrap();

        DatabaseService::quarantine_corrupted_db_files(&db_path).unwrap();

        assert!(!db_path.exists());
        assert!(!wal_path.exists());
        assert!(!shm_path.exists());

        let found_backup = std::fs::read_dir(tmp.path()).unwrap().any(|entry| {
            entry
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("tasksync.db.corrupt-")
        });
        assert!(found_backup);
    }
}
