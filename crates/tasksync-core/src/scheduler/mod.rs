//! Periodic sync scheduling.
//!
//! [`SyncScheduler`] owns one interval timer per enabled integration. Each tick
//! asks a [`CandidateSource`] which tasks to push, drains that integration's
//! share of the engine queue and records a [`SyncRun`] for observability.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::clock::Clock;
use crate::error::Result;
use crate::models::{Integration, IntegrationId, SyncRun, TaskId};
use crate::store::{IntegrationStore, SyncStatsStore};
use crate::sync::{
    QueueOptions, SyncEngine, SyncError, SyncOperation, SyncResult, IMMEDIATE_PRIORITY,
};

/// Supplies the tasks a scheduled run should push
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn candidates(&self, integration: &Integration) -> Result<Vec<TaskId>>;
}

/// Interval-driven sync runner with an explicit start/stop lifecycle
pub struct SyncScheduler {
    runner: Arc<Runner>,
    timers: Mutex<HashMap<IntegrationId, JoinHandle<()>>>,
}

struct Runner {
    engine: Arc<SyncEngine>,
    candidates: Arc<dyn CandidateSource>,
    stats: Arc<dyn SyncStatsStore>,
}

impl SyncScheduler {
    pub fn new(
        engine: Arc<SyncEngine>,
        candidates: Arc<dyn CandidateSource>,
        stats: Arc<dyn SyncStatsStore>,
    ) -> Self {
        Self {
            runner: Arc::new(Runner {
                engine,
                candidates,
                stats,
            }),
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn a timer for every enabled integration, replacing running ones.
    ///
    /// Returns the number of timers started.
    pub async fn start(&self) -> SyncResult<usize> {
        let integrations = self.runner.engine.integrations().list_integrations().await?;
        let mut started = 0;
        for integration in integrations.iter().filter(|i| i.sync_enabled) {
            self.spawn_timer(integration);
            started += 1;
        }
        tracing::info!("Sync scheduler started with {started} integration(s)");
        Ok(started)
    }

    /// Abort every timer. Operations already draining run to completion.
    pub fn stop(&self) {
        let mut timers = self.timers();
        for (_, handle) in timers.drain() {
            handle.abort();
        }
        tracing::info!("Sync scheduler stopped");
    }

    /// Replace the timer of one integration after its settings changed.
    ///
    /// Returns false when the integration is now missing or disabled, in
    /// which case no timer remains.
    pub async fn reschedule(&self, integration_id: &IntegrationId) -> SyncResult<bool> {
        self.abort_timer(integration_id);
        let integration = self
            .runner
            .engine
            .integrations()
            .get_integration(integration_id)
            .await?
            .filter(|integration| integration.sync_enabled);

        match integration {
            Some(integration) => {
                self.spawn_timer(&integration);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove the timer and all queued work of one integration.
    ///
    /// Returns the number of queued operations dropped.
    pub async fn unschedule(&self, integration_id: &IntegrationId) -> usize {
        self.abort_timer(integration_id);
        self.runner.engine.clear_integration(integration_id).await
    }

    /// Run one integration now at immediate priority, outside its interval
    pub async fn trigger_manual(&self, integration_id: &IntegrationId) -> SyncResult<SyncRun> {
        self.runner.run(integration_id, true).await
    }

    pub fn is_scheduled(&self, integration_id: &IntegrationId) -> bool {
        self.timers().contains_key(integration_id)
    }

    pub fn scheduled_count(&self) -> usize {
        self.timers().len()
    }

    fn spawn_timer(&self, integration: &Integration) {
        let period = integration.sync_interval(self.runner.engine.settings().default_sync_interval());
        let integration_id = integration.id;
        let runner = Arc::clone(&self.runner);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match runner.run(&integration_id, false).await {
                    Ok(_) => {}
                    Err(SyncError::IntegrationDisabledOrMissing(_)) => {
                        tracing::debug!(
                            integration_id = %integration_id,
                            "Skipping scheduled sync for disabled or missing integration"
                        );
                    }
                    Err(error) => tracing::warn!(
                        integration_id = %integration_id,
                        "Scheduled sync failed: {error}"
                    ),
                }
            }
        });

        if let Some(previous) = self.timers().insert(integration_id, handle) {
            previous.abort();
        }
        tracing::debug!(
            integration_id = %integration_id,
            "Scheduled sync every {:?}",
            period
        );
    }

    fn abort_timer(&self, integration_id: &IntegrationId) {
        if let Some(handle) = self.timers().remove(integration_id) {
            handle.abort();
        }
    }

    fn timers(&self) -> std::sync::MutexGuard<'_, HashMap<IntegrationId, JoinHandle<()>>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.timers().drain() {
            handle.abort();
        }
    }
}

impl Runner {
    async fn run(&self, integration_id: &IntegrationId, manual: bool) -> SyncResult<SyncRun> {
        let integration = self
            .engine
            .integrations()
            .get_integration(integration_id)
            .await?
            .filter(|integration| integration.sync_enabled)
            .ok_or(SyncError::IntegrationDisabledOrMissing(*integration_id))?;

        let clock = Arc::clone(self.engine.clock());
        let started_at = clock.now_millis();
        let started = Instant::now();
        let options = if manual {
            QueueOptions::default().with_priority(IMMEDIATE_PRIORITY)
        } else {
            QueueOptions::default()
        };

        for task_id in self.candidates.candidates(&integration).await? {
            if let Err(error) = self
                .engine
                .queue_sync(task_id, integration.id, SyncOperation::Push, options)
                .await
            {
                tracing::warn!(
                    integration_id = %integration.id,
                    task_id = %task_id,
                    "Failed to queue scheduled push: {error}"
                );
            }
        }
        let summary = self.engine.process_queue_for(&integration.id).await;

        let run = SyncRun {
            integration_id: integration.id,
            started_at,
            duration_ms: elapsed_millis(started.elapsed()),
            manual,
            summary,
        };
        if let Err(error) = self.stats.record_run(&run).await {
            tracing::warn!(
                integration_id = %integration.id,
                "Failed to record sync run: {error}"
            );
        }
        self.engine
            .integrations()
            .mark_synced(&integration.id, clock.now_millis())
            .await?;

        tracing::info!(
            integration_id = %integration.id,
            manual,
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            conflicts = summary.conflicts,
            "Sync run finished"
        );
        Ok(run)
    }
}

fn elapsed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
