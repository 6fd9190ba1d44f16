//! Shared fixtures for engine-level tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tasksync_core::adapter::{
    AdapterError, AdapterRegistry, AdapterResult, MemoryAdapter, PushOutcome, SyncAdapter,
};
use tasksync_core::clock::{Clock, ManualClock};
use tasksync_core::config::SyncSettings;
use tasksync_core::models::{ExternalTask, Integration, Provider, Task, TaskPatch};
use tasksync_core::store::memory::{
    MemoryIntegrationStore, MemorySyncMetadataStore, MemorySyncStatsStore, MemoryTaskStore,
};
use tasksync_core::store::TaskStore;
use tasksync_core::sync::SyncEngine;

pub const T0: i64 = 1_700_000_000_000;

/// Memory provider that can be told to fail pulls, or fail and stall pushes
#[derive(Debug)]
pub struct FlakyAdapter {
    pub remote: MemoryAdapter,
    failing_pushes: AtomicU32,
    failing_pulls: AtomicU32,
    push_delay: Mutex<Option<Duration>>,
}

impl FlakyAdapter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            remote: MemoryAdapter::new(clock),
            failing_pushes: AtomicU32::new(0),
            failing_pulls: AtomicU32::new(0),
            push_delay: Mutex::new(None),
        }
    }

    /// Fail the next `count` pushes with a network error
    pub fn fail_next_pushes(&self, count: u32) {
        self.failing_pushes.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` pulls with a network error
    pub fn fail_next_pulls(&self, count: u32) {
        self.failing_pulls.store(count, Ordering::SeqCst);
    }

    pub fn stall_pushes(&self, delay: Duration) {
        *self.push_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl SyncAdapter for FlakyAdapter {
    fn provider(&self) -> Provider {
        Provider::Memory
    }

    async fn push_task(
        &self,
        task: &Task,
        integration: &Integration,
        external_id: Option<&str>,
    ) -> AdapterResult<PushOutcome> {
        let delay = *self.push_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if take_one(&self.failing_pushes) {
            return Err(AdapterError::Network("connection reset".to_string()));
        }
        self.remote.push_task(task, integration, external_id).await
    }

    async fn pull_task(
        &self,
        external_id: &str,
        integration: &Integration,
    ) -> AdapterResult<ExternalTask> {
        if take_one(&self.failing_pulls) {
            return Err(AdapterError::Network("read timed out".to_string()));
        }
        self.remote.pull_task(external_id, integration).await
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub clock: ManualClock,
    pub tasks: Arc<MemoryTaskStore>,
    pub integrations: Arc<MemoryIntegrationStore>,
    pub metadata: Arc<MemorySyncMetadataStore>,
    pub stats: Arc<MemorySyncStatsStore>,
    pub adapter: Arc<FlakyAdapter>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(SyncSettings::default())
    }

    pub fn with_settings(settings: SyncSettings) -> Self {
        let clock = ManualClock::new(T0);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let tasks = Arc::new(MemoryTaskStore::new(Arc::clone(&shared)));
        let integrations = Arc::new(MemoryIntegrationStore::new());
        let metadata = Arc::new(MemorySyncMetadataStore::new(Arc::clone(&shared)));
        let adapter = Arc::new(FlakyAdapter::new(Arc::clone(&shared)));

        let engine = SyncEngine::new(
            tasks.clone(),
            integrations.clone(),
            metadata.clone(),
            AdapterRegistry::new().with_adapter(adapter.clone()),
        )
        .with_settings(settings)
        .with_clock(shared);

        Self {
            engine: Arc::new(engine),
            clock,
            tasks,
            integrations,
            metadata,
            stats: Arc::new(MemorySyncStatsStore::new()),
            adapter,
        }
    }

    /// One task and one enabled memory integration in workspace `ws`
    pub async fn seed(&self, title: &str) -> (Task, Integration) {
        let task = Task::new_at("ws", title, self.clock.now_millis()).with_content("internal body");
        let integration = Integration::new("ws", Provider::Memory, "board");
        self.tasks.insert(task.clone()).await;
        self.integrations.insert(integration.clone()).await;
        (task, integration)
    }

    pub fn advance_secs(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    pub async fn edit_internal(&self, task: &Task, patch: TaskPatch) -> Task {
        self.tasks.update_task(&task.id, &patch).await.unwrap()
    }

    pub async fn task(&self, task: &Task) -> Task {
        self.tasks.get_task(&task.id).await.unwrap().unwrap()
    }
}

pub fn title_patch(title: &str) -> TaskPatch {
    TaskPatch {
        title: Some(title.to_string()),
        ..TaskPatch::default()
    }
}
