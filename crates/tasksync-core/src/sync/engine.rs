//! Sync engine: queueing, push, pull and conflict handling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::detector;
use super::error::{SyncError, SyncResult};
use super::locks::KeyLocks;
use super::queue::{
    retry_delay, QueueOptions, QueuedSync, SyncOperation, SyncQueue, IMMEDIATE_PRIORITY,
};
use super::resolver::{ConflictResolver, Resolution};
use crate::adapter::{AdapterRegistry, PushOutcome, SyncAdapter};
use crate::clock::{Clock, SystemClock};
use crate::config::SyncSettings;
use crate::models::{
    ConflictInfo, ExternalTask, Integration, IntegrationId, SyncKey, SyncMetadata,
    SyncMetadataPatch, SyncStatus, SyncSummary, Task, TaskId,
};
use crate::store::{IntegrationStore, SyncMetadataStore, TaskStore};
use crate::util::compact_text;

const PUSH_CONFLICT_MESSAGE: &str = "Conflict detected during push";
const PULL_CONFLICT_MESSAGE: &str = "Conflict detected during pull";
const DETECTED_CONFLICT_MESSAGE: &str = "Conflict detected";

/// Bidirectional sync between internal tasks and external providers.
///
/// The engine owns its queue. All work for one (task, integration) pair is
/// serialized, and the queue is drained by a single worker at a time.
pub struct SyncEngine {
    tasks: Arc<dyn TaskStore>,
    integrations: Arc<dyn IntegrationStore>,
    metadata: Arc<dyn SyncMetadataStore>,
    adapters: AdapterRegistry,
    settings: SyncSettings,
    clock: Arc<dyn Clock>,
    queue: Mutex<SyncQueue>,
    drain: Mutex<()>,
    locks: KeyLocks,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("adapters", &self.adapters)
            .field("settings", &self.settings)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        integrations: Arc<dyn IntegrationStore>,
        metadata: Arc<dyn SyncMetadataStore>,
        adapters: AdapterRegistry,
    ) -> Self {
        let settings = SyncSettings::default();
        Self {
            tasks,
            integrations,
            metadata,
            adapters,
            queue: Mutex::new(SyncQueue::new(settings.queue_capacity)),
            settings,
            clock: Arc::new(SystemClock),
            drain: Mutex::new(()),
            locks: KeyLocks::default(),
        }
    }

    /// Replace the tuning settings. Resets the (still empty) queue capacity.
    #[must_use]
    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.queue = Mutex::new(SyncQueue::new(settings.queue_capacity));
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn integrations(&self) -> &Arc<dyn IntegrationStore> {
        &self.integrations
    }

    // -----------------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------------

    /// Queue an operation for later processing.
    ///
    /// Returns `Ok(false)` without queueing when the integration is missing or
    /// has sync disabled.
    pub async fn queue_sync(
        &self,
        task_id: TaskId,
        integration_id: IntegrationId,
        operation: SyncOperation,
        options: QueueOptions,
    ) -> SyncResult<bool> {
        let enabled = self
            .integrations
            .get_integration(&integration_id)
            .await?
            .is_some_and(|integration| integration.sync_enabled);
        if !enabled {
            tracing::debug!(
                task_id = %task_id,
                integration_id = %integration_id,
                operation = %operation,
                "Skipping enqueue for disabled or missing integration"
            );
            return Ok(false);
        }

        let entry = QueuedSync {
            key: SyncKey::new(task_id, integration_id),
            operation,
            priority: options
                .priority
                .unwrap_or_else(|| operation.default_priority()),
            retry_count: 0,
            max_retries: options.max_retries.unwrap_or(self.settings.max_retries),
            backoff_multiplier: options
                .backoff_multiplier
                .unwrap_or(self.settings.backoff_multiplier),
            timeout: options
                .timeout
                .unwrap_or_else(|| self.settings.operation_timeout()),
            scheduled_at: self.clock.now_millis(),
        };

        tracing::debug!(
            task_id = %task_id,
            integration_id = %integration_id,
            operation = %operation,
            priority = entry.priority,
            "Queued sync operation"
        );
        self.queue.lock().await.push(entry);
        Ok(true)
    }

    /// Queue with immediate priority and drain right away
    pub async fn trigger_immediate_sync(
        &self,
        task_id: TaskId,
        integration_id: IntegrationId,
        operation: SyncOperation,
    ) -> SyncResult<SyncSummary> {
        self.queue_sync(
            task_id,
            integration_id,
            operation,
            QueueOptions::default().with_priority(IMMEDIATE_PRIORITY),
        )
        .await?;
        Ok(self.process_queue().await)
    }

    /// Run every ready entry, one at a time.
    ///
    /// Failures never escape: each one becomes a metadata update plus a retry,
    /// drop or conflict decision reflected in the returned counts.
    pub async fn process_queue(&self) -> SyncSummary {
        self.drain_ready(None).await
    }

    /// Like [`Self::process_queue`], restricted to one integration's entries.
    ///
    /// Work queued for other integrations stays queued with its rank.
    pub async fn process_queue_for(&self, integration_id: &IntegrationId) -> SyncSummary {
        self.drain_ready(Some(integration_id)).await
    }

    async fn drain_ready(&self, only: Option<&IntegrationId>) -> SyncSummary {
        let _worker = self.drain.lock().await;
        let mut summary = SyncSummary::default();

        loop {
            let next = {
                let mut queue = self.queue.lock().await;
                queue.promote_due(self.clock.now_millis());
                match only {
                    Some(integration_id) => queue.pop_ready_for(integration_id),
                    None => queue.pop_ready(),
                }
            };
            let Some(entry) = next else {
                break;
            };

            match self.execute(&entry).await {
                Ok(()) => {
                    summary.processed += 1;
                    summary.succeeded += 1;
                }
                Err(error) if error.is_skip() => {
                    tracing::debug!(
                        task_id = %entry.key.task_id,
                        integration_id = %entry.key.integration_id,
                        "Skipped sync for disabled or missing integration"
                    );
                }
                Err(error) if error.is_conflict() => {
                    summary.processed += 1;
                    summary.conflicts += 1;
                    tracing::warn!(
                        task_id = %entry.key.task_id,
                        integration_id = %entry.key.integration_id,
                        operation = %entry.operation,
                        "{error}"
                    );
                }
                Err(error) => {
                    summary.processed += 1;
                    summary.failed += 1;
                    self.handle_failure(entry, &error).await;
                }
            }
        }

        summary
    }

    /// Entries waiting in the queue, ready or delayed
    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Drop all queued work for an integration
    pub async fn clear_integration(&self, integration_id: &IntegrationId) -> usize {
        let removed = self.queue.lock().await.clear_integration(integration_id);
        if removed > 0 {
            tracing::info!(
                integration_id = %integration_id,
                removed,
                "Cleared queued sync operations"
            );
        }
        removed
    }

    async fn execute(&self, entry: &QueuedSync) -> SyncResult<()> {
        let key = entry.key;
        let run = async {
            match entry.operation {
                SyncOperation::Push => self.push(key.task_id, key.integration_id).await.map(drop),
                SyncOperation::Pull => self.pull(key.task_id, key.integration_id).await.map(drop),
            }
        };

        match tokio::time::timeout(entry.timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                let error = SyncError::Timeout(entry.timeout);
                let _guard = self.locks.lock(key).await;
                match self.metadata.get(key).await {
                    Ok(existing) => self.record_failure(key, existing.as_ref(), &error).await,
                    Err(store_error) => tracing::warn!(
                        key = %key,
                        "Failed to load sync metadata after timeout: {store_error}"
                    ),
                }
                Err(error)
            }
        }
    }

    async fn handle_failure(&self, mut entry: QueuedSync, error: &SyncError) {
        if !error.is_retryable() {
            tracing::warn!(
                task_id = %entry.key.task_id,
                integration_id = %entry.key.integration_id,
                operation = %entry.operation,
                "Sync failed permanently: {error}"
            );
            return;
        }

        if !entry.can_retry() {
            tracing::error!(
                task_id = %entry.key.task_id,
                integration_id = %entry.key.integration_id,
                operation = %entry.operation,
                retry_count = entry.retry_count,
                "Sync retries exhausted: {error}"
            );
            return;
        }

        entry.retry_count += 1;
        let delay = retry_delay(
            entry.retry_count,
            entry.backoff_multiplier,
            self.settings.max_backoff(),
        );
        let due_at = self.clock.now_millis().saturating_add(duration_millis(delay));
        let retry_count = entry.retry_count;
        let key = entry.key;
        let operation = entry.operation;

        if self.queue.lock().await.schedule(entry, due_at) {
            tracing::warn!(
                task_id = %key.task_id,
                integration_id = %key.integration_id,
                operation = %operation,
                retry_count,
                delay_ms = duration_millis(delay),
                "Sync failed, retry scheduled: {error}"
            );
        } else {
            tracing::warn!(
                task_id = %key.task_id,
                integration_id = %key.integration_id,
                operation = %operation,
                "Sync queue is full, dropping retry"
            );
        }
    }

    // -----------------------------------------------------------------------
    // Push / pull
    // -----------------------------------------------------------------------

    /// Send the internal task to the provider.
    ///
    /// Checks the external record for a conflict first when the pair is
    /// already linked.
    pub async fn push(
        &self,
        task_id: TaskId,
        integration_id: IntegrationId,
    ) -> SyncResult<PushOutcome> {
        let key = SyncKey::new(task_id, integration_id);
        let _guard = self.locks.lock(key).await;

        let task = self.load_task(&task_id).await?;
        let integration = self.enabled_integration(&integration_id).await?;
        let adapter = self.adapter_for(&integration)?;
        let existing = self.metadata.get(key).await?;

        match self
            .push_linked(adapter.as_ref(), &task, &integration, existing.as_ref())
            .await
        {
            Ok(outcome) => {
                let patch = SyncMetadataPatch::synced(
                    self.clock.now_millis(),
                    Some(outcome.last_modified),
                )
                .with_external_id(outcome.external_id.clone());
                self.upsert_metadata(key, existing.as_ref(), &patch).await?;
                tracing::info!(
                    task_id = %task_id,
                    integration_id = %integration_id,
                    external_id = %outcome.external_id,
                    "Pushed task"
                );
                Ok(outcome)
            }
            Err(error) if error.is_conflict() => Err(error),
            Err(error) => {
                self.record_failure(key, existing.as_ref(), &error).await;
                Err(error)
            }
        }
    }

    async fn push_linked(
        &self,
        adapter: &dyn SyncAdapter,
        task: &Task,
        integration: &Integration,
        existing: Option<&SyncMetadata>,
    ) -> SyncResult<PushOutcome> {
        let linked = existing.and_then(|metadata| {
            metadata
                .external_id
                .as_deref()
                .map(|external_id| (metadata, external_id))
        });

        if let Some((metadata, external_id)) = linked {
            // Never overwrite external state we could not read.
            let external = adapter.pull_task(external_id, integration).await?;
            if detector::detect(task, &external, metadata) {
                return Err(self.mark_conflict(metadata.key(), PUSH_CONFLICT_MESSAGE).await);
            }
        }

        let external_id = linked.map(|(_, external_id)| external_id);
        Ok(adapter.push_task(task, integration, external_id).await?)
    }

    /// Apply the external record to the internal task
    pub async fn pull(&self, task_id: TaskId, integration_id: IntegrationId) -> SyncResult<Task> {
        let integration = self.enabled_integration(&integration_id).await?;
        let key = SyncKey::new(task_id, integration_id);
        let _guard = self.locks.lock(key).await;

        let metadata = self.metadata.get(key).await?;
        let Some((metadata, external_id)) = metadata.and_then(|metadata| {
            let external_id = metadata.external_id.clone()?;
            Some((metadata, external_id))
        }) else {
            return Err(SyncError::NotLinked(key));
        };

        let adapter = self.adapter_for(&integration)?;
        let task = self.load_task(&task_id).await?;

        match self
            .pull_linked(adapter.as_ref(), &task, &integration, &metadata, &external_id)
            .await
        {
            Ok((task, external)) => {
                let patch =
                    SyncMetadataPatch::synced(self.clock.now_millis(), Some(external.last_modified));
                self.metadata.update(key, &patch).await?;
                tracing::info!(
                    task_id = %task_id,
                    integration_id = %integration_id,
                    external_id = %external_id,
                    "Pulled task"
                );
                Ok(task)
            }
            Err(error) if error.is_conflict() => Err(error),
            Err(error) => {
                self.record_failure(key, Some(&metadata), &error).await;
                Err(error)
            }
        }
    }

    async fn pull_linked(
        &self,
        adapter: &dyn SyncAdapter,
        task: &Task,
        integration: &Integration,
        metadata: &SyncMetadata,
        external_id: &str,
    ) -> SyncResult<(Task, ExternalTask)> {
        let external = adapter.pull_task(external_id, integration).await?;
        if detector::detect(task, &external, metadata) {
            return Err(self.mark_conflict(metadata.key(), PULL_CONFLICT_MESSAGE).await);
        }

        let patch = adapter.map_from_external(&external);
        let task = self.update_task(&task.id, &patch).await?;
        Ok((task, external))
    }

    // -----------------------------------------------------------------------
    // Status and conflicts
    // -----------------------------------------------------------------------

    pub async fn get_sync_status(
        &self,
        task_id: TaskId,
        integration_id: IntegrationId,
    ) -> SyncResult<Option<SyncMetadata>> {
        Ok(self
            .metadata
            .get(SyncKey::new(task_id, integration_id))
            .await?)
    }

    /// Pairs currently waiting for a resolution
    pub async fn list_conflicts(&self) -> SyncResult<Vec<SyncMetadata>> {
        Ok(self.metadata.list_by_status(SyncStatus::Conflict).await?)
    }

    /// Compare both sides now, marking the pair as conflicted when they diverged.
    ///
    /// Returns `None` for pairs that were never synced.
    pub async fn detect_conflicts(
        &self,
        task_id: TaskId,
        integration_id: IntegrationId,
    ) -> SyncResult<Option<ConflictInfo>> {
        let key = SyncKey::new(task_id, integration_id);
        let _guard = self.locks.lock(key).await;

        let Some(snapshot) = self.snapshot(key).await? else {
            return Ok(None);
        };
        let info = detector::conflict_info(&snapshot.task, &snapshot.external, &snapshot.metadata);

        if info.is_some() && snapshot.metadata.sync_status != SyncStatus::Conflict {
            self.mark_conflict(key, DETECTED_CONFLICT_MESSAGE).await;
        }
        Ok(info)
    }

    /// Settle a conflict with the chosen strategy and return the final task
    pub async fn resolve_conflict(
        &self,
        task_id: TaskId,
        integration_id: IntegrationId,
        resolution: &Resolution,
    ) -> SyncResult<Task> {
        let key = SyncKey::new(task_id, integration_id);
        let _guard = self.locks.lock(key).await;

        let Some(snapshot) = self.snapshot(key).await? else {
            return Err(SyncError::NoConflictFound(key));
        };
        let live = detector::detect(&snapshot.task, &snapshot.external, &snapshot.metadata);
        if !live && snapshot.metadata.sync_status != SyncStatus::Conflict {
            return Err(SyncError::NoConflictFound(key));
        }

        let conflict = ConflictInfo {
            task_id,
            integration_id,
            differences: detector::field_differences(&snapshot.task, &snapshot.external),
            internal: snapshot.task,
            external: snapshot.external,
        };
        let adapter = self.adapter_for(&snapshot.integration)?;
        let resolved = ConflictResolver::new(adapter.as_ref(), self.tasks.as_ref())
            .apply(&conflict, &snapshot.integration, resolution)
            .await?;

        let patch =
            SyncMetadataPatch::synced(self.clock.now_millis(), Some(resolved.last_external_update));
        self.metadata.update(key, &patch).await?;
        tracing::info!(
            task_id = %task_id,
            integration_id = %integration_id,
            strategy = %resolution.strategy,
            "Resolved sync conflict"
        );
        Ok(resolved.task)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Both sides of a linked pair, or `None` when the pair was never linked
    async fn snapshot(&self, key: SyncKey) -> SyncResult<Option<Snapshot>> {
        let Some(metadata) = self.metadata.get(key).await? else {
            return Ok(None);
        };
        let Some(external_id) = metadata.external_id.clone() else {
            return Ok(None);
        };

        let integration = self
            .integrations
            .get_integration(&key.integration_id)
            .await?
            .ok_or(SyncError::IntegrationDisabledOrMissing(key.integration_id))?;
        let adapter = self.adapter_for(&integration)?;
        let task = self.load_task(&key.task_id).await?;
        let external = adapter.pull_task(&external_id, &integration).await?;

        Ok(Some(Snapshot {
            integration,
            task,
            external,
            metadata,
        }))
    }

    async fn enabled_integration(&self, id: &IntegrationId) -> SyncResult<Integration> {
        self.integrations
            .get_integration(id)
            .await?
            .filter(|integration| integration.sync_enabled)
            .ok_or(SyncError::IntegrationDisabledOrMissing(*id))
    }

    fn adapter_for(&self, integration: &Integration) -> SyncResult<Arc<dyn SyncAdapter>> {
        self.adapters
            .get(integration.provider)
            .ok_or(SyncError::AdapterNotFound(integration.provider))
    }

    async fn load_task(&self, id: &TaskId) -> SyncResult<Task> {
        self.tasks
            .get_task(id)
            .await?
            .ok_or(SyncError::TaskNotFound(*id))
    }

    async fn update_task(&self, id: &TaskId, patch: &crate::models::TaskPatch) -> SyncResult<Task> {
        self.tasks
            .update_task(id, patch)
            .await
            .map_err(|error| match error {
                crate::Error::NotFound(_) => SyncError::TaskNotFound(*id),
                other => other.into(),
            })
    }

    /// Create the record as `pending` when absent, then apply `patch`
    async fn upsert_metadata(
        &self,
        key: SyncKey,
        existing: Option<&SyncMetadata>,
        patch: &SyncMetadataPatch,
    ) -> SyncResult<SyncMetadata> {
        if existing.is_none() {
            self.metadata
                .create(&SyncMetadata::new(key, self.clock.now_millis()))
                .await?;
        }
        Ok(self.metadata.update(key, patch).await?)
    }

    /// Flag the pair as conflicted and build the error to return
    async fn mark_conflict(&self, key: SyncKey, message: &str) -> SyncError {
        if let Err(error) = self
            .metadata
            .update(key, &SyncMetadataPatch::conflict(message))
            .await
        {
            tracing::warn!(key = %key, "Failed to mark sync conflict: {error}");
        }
        SyncError::ConflictDetected {
            key,
            message: message.to_string(),
        }
    }

    /// Count one more consecutive failure. Bookkeeping errors are only logged.
    ///
    /// A conflicted pair keeps its status; only resolution leaves `conflict`.
    async fn record_failure(
        &self,
        key: SyncKey,
        existing: Option<&SyncMetadata>,
        error: &SyncError,
    ) {
        let retry_count = existing.map_or(0, |metadata| metadata.retry_count) + 1;
        let mut patch = SyncMetadataPatch::failed(retry_count, compact_text(&error.to_string()));
        if existing.is_some_and(|metadata| metadata.sync_status == SyncStatus::Conflict) {
            patch.sync_status = None;
        }
        if let Err(store_error) = self.upsert_metadata(key, existing, &patch).await {
            tracing::warn!(key = %key, "Failed to record sync failure: {store_error}");
        }
    }
}

struct Snapshot {
    integration: Integration,
    task: Task,
    external: ExternalTask,
    metadata: SyncMetadata,
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
