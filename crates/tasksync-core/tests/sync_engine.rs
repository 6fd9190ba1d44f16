//! End-to-end engine behavior against in-memory stores and a memory provider

mod common;

use std::time::Duration;

use common::{title_patch, Harness, T0};
use pretty_assertions::assert_eq;
use tasksync_core::config::SyncSettings;
use tasksync_core::models::{SyncStatus, SyncSummary, TaskPatch};
use tasksync_core::sync::{QueueOptions, SyncError, SyncOperation};
use tasksync_core::TaskId;

#[tokio::test]
async fn push_then_pull_without_changes_stays_synced() {
    let h = Harness::new();
    let (task, integration) = h.seed("Write report").await;

    let summary = h
        .engine
        .trigger_immediate_sync(task.id, integration.id, SyncOperation::Push)
        .await
        .unwrap();
    assert_eq!(
        summary,
        SyncSummary {
            processed: 1,
            succeeded: 1,
            failed: 0,
            conflicts: 0
        }
    );

    h.advance_secs(5);
    let pulled = h.engine.pull(task.id, integration.id).await.unwrap();
    assert_eq!(pulled.title, task.title);
    assert_eq!(pulled.content, task.content);

    let metadata = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.sync_status, SyncStatus::Synced);
    assert_eq!(metadata.retry_count, 0);
    assert_eq!(metadata.last_error, None);
    assert_eq!(h.metadata.len().await, 1);
}

#[tokio::test]
async fn pull_applies_external_edit_when_internal_is_unchanged() {
    let h = Harness::new();
    let (task, integration) = h.seed("Draft agenda").await;
    let pushed = h.engine.push(task.id, integration.id).await.unwrap();

    h.advance_secs(1);
    h.adapter
        .remote
        .edit_external(&pushed.external_id, |record| {
            record.title = "Final agenda".to_string();
            record.content = Some("edited remotely".to_string());
        })
        .await;

    assert!(h
        .engine
        .detect_conflicts(task.id, integration.id)
        .await
        .unwrap()
        .is_none());

    let pulled = h.engine.pull(task.id, integration.id).await.unwrap();
    assert_eq!(pulled.title, "Final agenda");
    assert_eq!(pulled.content.as_deref(), Some("edited remotely"));

    let metadata = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.sync_status, SyncStatus::Synced);
    assert_eq!(metadata.last_external_update, Some(T0 + 1_000));
}

#[tokio::test]
async fn edits_on_both_sides_are_a_conflict() {
    let h = Harness::new();
    let (task, integration) = h.seed("Budget").await;
    let pushed = h.engine.push(task.id, integration.id).await.unwrap();

    h.advance_secs(1);
    h.adapter
        .remote
        .edit_external(&pushed.external_id, |record| {
            record.title = "Budget (finance)".to_string();
        })
        .await;
    h.advance_secs(1);
    h.edit_internal(&task, title_patch("Budget (ops)")).await;

    let conflict = h
        .engine
        .detect_conflicts(task.id, integration.id)
        .await
        .unwrap()
        .expect("both sides changed after the last sync");
    assert!(conflict.differs_in("title"));
    assert!(!conflict.differs_in("content"));

    let status = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.sync_status, SyncStatus::Conflict);
}

#[tokio::test]
async fn queued_conflicts_are_counted_and_not_retried() {
    let h = Harness::new();
    let (task, integration) = h.seed("Roadmap").await;
    let pushed = h.engine.push(task.id, integration.id).await.unwrap();

    h.advance_secs(1);
    h.adapter
        .remote
        .edit_external(&pushed.external_id, |record| record.archived = true)
        .await;
    h.advance_secs(1);
    h.edit_internal(&task, title_patch("Roadmap v2")).await;

    for operation in [SyncOperation::Push, SyncOperation::Pull] {
        h.engine
            .queue_sync(task.id, integration.id, operation, QueueOptions::default())
            .await
            .unwrap();
    }
    let summary = h.engine.process_queue().await;
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.conflicts, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(h.engine.queue_len().await, 0);

    let metadata = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.sync_status, SyncStatus::Conflict);
    assert_eq!(
        metadata.last_error.as_deref(),
        Some("Conflict detected during pull")
    );
    assert_eq!(h.engine.list_conflicts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn transient_failures_retry_with_backoff_until_success() {
    let h = Harness::new();
    let (task, integration) = h.seed("Flaky").await;
    h.adapter.fail_next_pushes(2);

    let first = h
        .engine
        .trigger_immediate_sync(task.id, integration.id, SyncOperation::Push)
        .await
        .unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(h.engine.queue_len().await, 1);

    let metadata = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.sync_status, SyncStatus::Error);
    assert_eq!(metadata.retry_count, 1);
    assert!(metadata.last_error.unwrap().contains("connection reset"));

    // First retry waits 2^1 * 1000ms * 2
    h.advance_secs(3);
    assert_eq!(h.engine.process_queue().await.processed, 0);
    h.advance_secs(1);
    assert_eq!(h.engine.process_queue().await.failed, 1);

    // Second retry waits 2^2 * 1000ms * 2
    h.advance_secs(7);
    assert_eq!(h.engine.process_queue().await.processed, 0);
    h.advance_secs(1);
    assert_eq!(h.engine.process_queue().await.succeeded, 1);

    let metadata = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.sync_status, SyncStatus::Synced);
    assert_eq!(metadata.retry_count, 0);
    assert_eq!(metadata.last_error, None);
    assert_eq!(h.engine.queue_len().await, 0);
}

#[tokio::test]
async fn exhausted_retries_leave_the_pair_in_error() {
    let h = Harness::new();
    let (task, integration) = h.seed("Doomed").await;
    h.adapter.fail_next_pushes(u32::MAX);

    h.engine
        .trigger_immediate_sync(task.id, integration.id, SyncOperation::Push)
        .await
        .unwrap();
    for _ in 0..3 {
        h.advance_secs(300);
        assert_eq!(h.engine.process_queue().await.failed, 1);
    }
    assert_eq!(h.engine.queue_len().await, 0);

    h.advance_secs(300);
    assert_eq!(h.engine.process_queue().await, SyncSummary::default());

    let metadata = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.sync_status, SyncStatus::Error);
    assert_eq!(metadata.retry_count, 4);
    assert!(metadata.last_error.is_some());
}

#[tokio::test]
async fn zero_retries_drop_after_first_failure() {
    let settings = SyncSettings {
        max_retries: 0,
        ..SyncSettings::default()
    };
    let h = Harness::with_settings(settings);
    let (task, integration) = h.seed("No retry").await;
    h.adapter.fail_next_pushes(1);

    let summary = h
        .engine
        .trigger_immediate_sync(task.id, integration.id, SyncOperation::Push)
        .await
        .unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(h.engine.queue_len().await, 0);
}

#[tokio::test]
async fn disabled_integration_is_a_silent_no_op() {
    let h = Harness::new();
    let (task, integration) = h.seed("Paused").await;
    h.integrations.set_enabled(&integration.id, false).await;

    h.engine
        .queue_sync(
            task.id,
            integration.id,
            SyncOperation::Push,
            QueueOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(h.engine.process_queue().await.processed, 0);
    assert!(h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .is_none());

    let error = h.engine.push(task.id, integration.id).await.unwrap_err();
    assert!(matches!(error, SyncError::IntegrationDisabledOrMissing(_)));
}

#[tokio::test]
async fn integration_disabled_after_enqueue_is_skipped() {
    let h = Harness::new();
    let (task, integration) = h.seed("Late toggle").await;
    h.engine
        .queue_sync(
            task.id,
            integration.id,
            SyncOperation::Push,
            QueueOptions::default(),
        )
        .await
        .unwrap();
    h.integrations.set_enabled(&integration.id, false).await;

    assert_eq!(h.engine.process_queue().await, SyncSummary::default());
    assert_eq!(h.engine.queue_len().await, 0);
}

#[tokio::test]
async fn pull_of_removed_external_record_is_not_retried() {
    let h = Harness::new();
    let (task, integration) = h.seed("Vanishing").await;
    let pushed = h.engine.push(task.id, integration.id).await.unwrap();
    h.adapter.remote.remove(&pushed.external_id).await;

    let summary = h
        .engine
        .trigger_immediate_sync(task.id, integration.id, SyncOperation::Pull)
        .await
        .unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(h.engine.queue_len().await, 0);

    let metadata = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.sync_status, SyncStatus::Error);
    assert!(metadata.last_error.unwrap().contains("not found"));
}

#[tokio::test(start_paused = true)]
async fn slow_operations_time_out_and_retry() {
    let settings = SyncSettings {
        operation_timeout_ms: 1_000,
        ..SyncSettings::default()
    };
    let h = Harness::with_settings(settings);
    let (task, integration) = h.seed("Slow").await;
    h.adapter.stall_pushes(Duration::from_secs(60));

    let summary = h
        .engine
        .trigger_immediate_sync(task.id, integration.id, SyncOperation::Push)
        .await
        .unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(h.engine.queue_len().await, 1);

    let metadata = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.sync_status, SyncStatus::Error);
    assert_eq!(
        metadata.last_error.as_deref(),
        Some("Sync operation timed out after 1000ms")
    );
}

#[tokio::test]
async fn content_only_internal_edit_still_pushes_cleanly() {
    let h = Harness::new();
    let (task, integration) = h.seed("Notes").await;
    let pushed = h.engine.push(task.id, integration.id).await.unwrap();

    h.advance_secs(2);
    h.edit_internal(
        &task,
        TaskPatch {
            content: Some(Some("more detail".to_string())),
            ..TaskPatch::default()
        },
    )
    .await;
    h.engine.push(task.id, integration.id).await.unwrap();

    let remote = h.adapter.remote.get(&pushed.external_id).await.unwrap();
    assert_eq!(remote.content.as_deref(), Some("more detail"));
    assert_eq!(h.adapter.remote.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn per_entry_options_override_settings() {
    let h = Harness::new();
    let (task, integration) = h.seed("Tuned").await;
    h.adapter.stall_pushes(Duration::from_secs(5));

    let options = QueueOptions::default()
        .with_max_retries(1)
        .with_timeout(Duration::from_secs(2));
    h.engine
        .queue_sync(task.id, integration.id, SyncOperation::Push, options)
        .await
        .unwrap();
    assert_eq!(h.engine.process_queue().await.failed, 1);

    h.advance_secs(300);
    assert_eq!(h.engine.process_queue().await.failed, 1);
    assert_eq!(h.engine.queue_len().await, 0);

    let metadata = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.retry_count, 2);
    assert_eq!(
        metadata.last_error.as_deref(),
        Some("Sync operation timed out after 2000ms")
    );
}

#[tokio::test]
async fn failed_read_before_push_retries_without_overwriting_remote() {
    let h = Harness::new();
    let (task, integration) = h.seed("Checklist").await;
    let pushed = h.engine.push(task.id, integration.id).await.unwrap();

    h.advance_secs(1);
    h.edit_internal(&task, title_patch("Checklist v2")).await;
    h.adapter.fail_next_pulls(1);

    let summary = h
        .engine
        .trigger_immediate_sync(task.id, integration.id, SyncOperation::Push)
        .await
        .unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.conflicts, 0);
    assert_eq!(h.engine.queue_len().await, 1);

    let remote = h.adapter.remote.get(&pushed.external_id).await.unwrap();
    assert_eq!(remote.title, "Checklist");

    let metadata = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.sync_status, SyncStatus::Error);
    assert_eq!(metadata.retry_count, 1);
    assert!(metadata.last_error.unwrap().contains("read timed out"));

    h.advance_secs(4);
    assert_eq!(h.engine.process_queue().await.succeeded, 1);
    let remote = h.adapter.remote.get(&pushed.external_id).await.unwrap();
    assert_eq!(remote.title, "Checklist v2");
}

#[tokio::test]
async fn failures_keep_a_conflicted_pair_in_conflict() {
    let h = Harness::new();
    let (task, integration) = h.seed("Launch plan").await;
    let pushed = h.engine.push(task.id, integration.id).await.unwrap();

    h.advance_secs(1);
    h.adapter
        .remote
        .edit_external(&pushed.external_id, |record| {
            record.title = "Launch plan (remote)".to_string();
        })
        .await;
    h.advance_secs(1);
    h.edit_internal(&task, title_patch("Launch plan (local)")).await;
    assert!(h
        .engine
        .pull(task.id, integration.id)
        .await
        .unwrap_err()
        .is_conflict());

    h.adapter.remote.remove(&pushed.external_id).await;
    let error = h.engine.push(task.id, integration.id).await.unwrap_err();
    assert!(matches!(error, SyncError::ExternalNotFound { .. }));

    let metadata = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.sync_status, SyncStatus::Conflict);
    assert_eq!(metadata.retry_count, 1);
    assert!(metadata.last_error.unwrap().contains("not found"));
    assert_eq!(h.engine.list_conflicts().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_pushes_of_one_pair_are_serialized() {
    let h = Harness::new();
    let (task, integration) = h.seed("Race").await;
    h.adapter.stall_pushes(Duration::from_millis(500));

    let (first, second) = tokio::join!(
        h.engine.push(task.id, integration.id),
        h.engine.push(task.id, integration.id)
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(first.external_id, second.external_id);
    assert_eq!(h.metadata.len().await, 1);
    assert_eq!(h.adapter.remote.len().await, 1);
    let metadata = h
        .engine
        .get_sync_status(task.id, integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn push_of_missing_task_fails_even_when_integration_is_disabled() {
    let h = Harness::new();
    let (_, integration) = h.seed("Unrelated").await;
    h.integrations.set_enabled(&integration.id, false).await;

    let missing = TaskId::new();
    let error = h.engine.push(missing, integration.id).await.unwrap_err();
    assert!(matches!(error, SyncError::TaskNotFound(id) if id == missing));
}
