use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::CommandFactory;
use pretty_assertions::assert_eq;
use tasksync_core::config::SyncSettings;
use tasksync_core::models::{
    Provider, SyncKey, SyncMetadata, SyncMetadataPatch, SyncStatus, SyncSummary, TaskStatus,
};
use tasksync_core::sync::SyncOperation;
use tasksync_core::{Integration, IntegrationId, TaskId};

use crate::cli::{Cli, CompletionShell};
use crate::commands::common::{
    format_metadata_lines, format_relative_time, format_summary, load_settings, normalize_title,
    open_database, parse_integration_id, parse_task_id,
};
use crate::commands::completions::{render_completions, run_completions};
use crate::commands::sync::run_sync_now;
use crate::commands::task::{run_task_add, run_task_edit, TaskEdit};
use crate::error::CliError;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn normalize_title_joins_words_and_rejects_empty() {
    let parts = vec!["  Ship".to_string(), "release ".to_string()];
    assert_eq!(normalize_title(&parts).unwrap(), "Ship release");
    assert!(matches!(
        normalize_title(&[" ".to_string()]),
        Err(CliError::EmptyTitle)
    ));
}

#[test]
fn ids_are_validated() {
    let task_id = TaskId::new();
    assert_eq!(parse_task_id(&format!(" {task_id} ")).unwrap(), task_id);

    let integration_id = IntegrationId::new();
    assert_eq!(
        parse_integration_id(&integration_id.to_string()).unwrap(),
        integration_id
    );

    let error = parse_task_id("not-a-uuid").unwrap_err();
    assert_eq!(error.to_string(), "Invalid task id: not-a-uuid");
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
    assert_eq!(format_relative_time(now - 14 * 24 * 60 * 60_000, now), "2w ago");
}

#[test]
fn format_summary_lists_every_counter() {
    let summary = SyncSummary {
        processed: 3,
        succeeded: 1,
        failed: 1,
        conflicts: 1,
    };
    assert_eq!(
        format_summary(&summary),
        "processed 3, succeeded 1, failed 1, conflicts 1"
    );
}

#[test]
fn metadata_lines_include_last_error() {
    let key = SyncKey::new(TaskId::new(), IntegrationId::new());
    let mut metadata = SyncMetadata::new(key, 0);
    metadata.apply(&SyncMetadataPatch::failed(2, "network down"), 1_000);

    let lines = format_metadata_lines(&metadata);
    assert_eq!(lines[0], format!("status:        {}", SyncStatus::Error));
    assert!(lines.contains(&"retries:       2".to_string()));
    assert_eq!(lines.last().unwrap(), "last error:    network down");
}

#[test]
fn task_edit_builds_patch() {
    let patch = TaskEdit {
        content: Some("   ".to_string()),
        status: Some("in_progress".to_string()),
        archive: true,
        ..TaskEdit::default()
    }
    .into_patch()
    .unwrap();
    assert_eq!(patch.title, None);
    assert_eq!(patch.content, Some(None));
    assert_eq!(patch.status, Some(TaskStatus::InProgress));
    assert_eq!(patch.archived, Some(true));
}

#[test]
fn task_edit_rejects_empty_and_invalid_input() {
    assert!(matches!(
        TaskEdit::default().into_patch(),
        Err(CliError::EmptyEdit)
    ));
    assert!(matches!(
        TaskEdit {
            title: Some(" ".to_string()),
            ..TaskEdit::default()
        }
        .into_patch(),
        Err(CliError::EmptyTitle)
    ));
    assert!(matches!(
        TaskEdit {
            status: Some("someday".to_string()),
            ..TaskEdit::default()
        }
        .into_patch(),
        Err(CliError::Core(_))
    ));
}

#[test]
fn load_settings_reads_json_file() {
    let path = unique_test_path("settings", "json");
    std::fs::write(&path, r#"{ "max_retries": 5, "operation_timeout_ms": 2000 }"#).unwrap();

    let settings = load_settings(Some(&path)).unwrap();
    assert_eq!(settings.max_retries, 5);
    assert_eq!(settings.operation_timeout_ms, 2_000);
    assert_eq!(
        settings.backoff_multiplier,
        SyncSettings::default().backoff_multiplier
    );
    let _ = std::fs::remove_file(path);
}

#[test]
fn load_settings_reports_missing_and_unknown_fields() {
    let missing = unique_test_path("missing", "json");
    assert!(matches!(
        load_settings(Some(&missing)),
        Err(CliError::Config(_))
    ));

    let path = unique_test_path("unknown", "json");
    std::fs::write(&path, r#"{ "retries": 5 }"#).unwrap();
    assert!(load_settings(Some(&path)).is_err());
    let _ = std::fs::remove_file(path);
}

#[test]
fn bash_completions_name_the_binary() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("_tasksync()"));
    assert!(script.contains("complete -F _tasksync"));
}

#[test]
fn run_completions_writes_script_file() {
    let output_path = unique_test_path("completions", "fish");
    run_completions(CompletionShell::Fish, Some(&output_path)).unwrap();

    let script = std::fs::read_to_string(&output_path).unwrap();
    assert!(script.contains("complete -c tasksync"));
    let _ = std::fs::remove_file(output_path);
}

#[tokio::test(flavor = "multi_thread")]
async fn task_add_and_edit_persist() {
    let db_path = unique_test_path("tasks", "db");
    run_task_add(
        &["Draft".to_string(), "notes".to_string()],
        "ws",
        Some("first pass".to_string()),
        &db_path,
    )
    .await
    .unwrap();

    let db = open_database(&db_path).await.unwrap();
    let tasks = db.list_tasks("ws", false).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Draft notes");
    assert_eq!(tasks[0].content.as_deref(), Some("first pass"));
    drop(db);

    let edit = TaskEdit {
        title: Some("Final notes".to_string()),
        status: Some("done".to_string()),
        ..TaskEdit::default()
    };
    run_task_edit(&tasks[0].id.to_string(), edit, &db_path)
        .await
        .unwrap();

    let db = open_database(&db_path).await.unwrap();
    let task = &db.list_tasks("ws", false).await.unwrap()[0];
    assert_eq!(task.title, "Final notes");
    assert_eq!(task.status, TaskStatus::Done);
    drop(db);
    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_push_writes_local_file_record() {
    let db_path = unique_test_path("push", "db");
    let board = unique_test_path("board", "d");

    let db = open_database(&db_path).await.unwrap();
    let task = db.create_task("ws", "Publish docs").await.unwrap();
    let integration = Integration::new("ws", Provider::LocalFile, board.display().to_string());
    db.create_integration(&integration).await.unwrap();
    drop(db);

    run_sync_now(
        SyncOperation::Push,
        &task.id.to_string(),
        &integration.id.to_string(),
        SyncSettings::default(),
        &db_path,
    )
    .await
    .unwrap();

    let files = std::fs::read_dir(&board).unwrap().count();
    assert_eq!(files, 1);

    let _ = std::fs::remove_dir_all(&board);
    cleanup_db_files(&db_path);
}

fn unique_test_path(label: &str, extension: &str) -> PathBuf {
    static NEXT_TEST_ID: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let sequence = NEXT_TEST_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "tasksync-cli-{label}-{timestamp}-{sequence}.{extension}"
    ))
}

fn cleanup_db_files(path: &Path) {
    // On Windows, libsql can keep file handles alive briefly after drop.
    if cfg!(windows) {
        return;
    }
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return;
    };
    let _ = std::fs::remove_file(path);
    for suffix in ["-wal", "-shm"] {
        let _ = std::fs::remove_file(path.with_file_name(format!("{name}{suffix}")));
    }
}
