use std::path::Path;

use tasksync_core::config::SyncSettings;
use tasksync_core::models::TaskPatch;
use tasksync_core::store::SyncStatsStore;
use tasksync_core::sync::{Resolution, SyncOperation};
use tasksync_core::util::{format_millis, normalize_text_option};

use crate::commands::common::{
    build_engine, format_metadata_lines, format_summary, open_database, parse_integration_id,
    parse_task_id,
};
use crate::error::CliError;

pub async fn run_sync_now(
    operation: SyncOperation,
    task: &str,
    integration: &str,
    settings: SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let task_id = parse_task_id(task)?;
    let integration_id = parse_integration_id(integration)?;
    let db = open_database(db_path).await?;
    let engine = build_engine(&db, settings);

    let summary = engine
        .trigger_immediate_sync(task_id, integration_id, operation)
        .await?;
    if summary.processed == 0 {
        println!("Nothing synced: integration is disabled or missing");
        return Ok(());
    }

    println!("{operation}: {}", format_summary(&summary));
    if let Some(metadata) = engine.get_sync_status(task_id, integration_id).await? {
        for line in format_metadata_lines(&metadata) {
            println!("  {line}");
        }
    }
    Ok(())
}

pub async fn run_sync_status(
    task: &str,
    integration: &str,
    as_json: bool,
    settings: SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let task_id = parse_task_id(task)?;
    let integration_id = parse_integration_id(integration)?;
    let db = open_database(db_path).await?;
    let engine = build_engine(&db, settings);

    let metadata = engine.get_sync_status(task_id, integration_id).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    match metadata {
        Some(metadata) => {
            for line in format_metadata_lines(&metadata) {
                println!("{line}");
            }
        }
        None => println!("Never synced."),
    }
    Ok(())
}

pub async fn run_sync_conflicts(
    pair: Option<(&str, &str)>,
    as_json: bool,
    settings: SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let engine = build_engine(&db, settings);

    let Some((task, integration)) = pair else {
        let conflicts = engine.list_conflicts().await?;
        if as_json {
            println!("{}", serde_json::to_string_pretty(&conflicts)?);
        } else if conflicts.is_empty() {
            println!("No sync conflicts.");
        } else {
            for metadata in &conflicts {
                println!(
                    "{}  {}  since {}",
                    metadata.task_id,
                    metadata.integration_id,
                    format_millis(Some(metadata.updated_at))
                );
            }
        }
        return Ok(());
    };

    let task_id = parse_task_id(task)?;
    let integration_id = parse_integration_id(integration)?;
    let conflict = engine.detect_conflicts(task_id, integration_id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&conflict)?);
        return Ok(());
    }

    match conflict {
        Some(conflict) => {
            println!("Conflict: both sides changed since the last sync");
            for difference in &conflict.differences {
                println!(
                    "  {:<9} internal {}  external {}",
                    difference.field, difference.internal, difference.external
                );
            }
        }
        None => println!("No conflict."),
    }
    Ok(())
}

pub async fn run_sync_resolve(
    task: &str,
    integration: &str,
    strategy: &str,
    title: Option<String>,
    content: Option<String>,
    settings: SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let task_id = parse_task_id(task)?;
    let integration_id = parse_integration_id(integration)?;

    let merged = TaskPatch {
        title: normalize_text_option(title),
        content: content.map(|content| normalize_text_option(Some(content))),
        ..TaskPatch::default()
    };
    let merged = (!merged.is_empty()).then_some(merged);
    let resolution = Resolution::parse(strategy, merged)?;

    let db = open_database(db_path).await?;
    let engine = build_engine(&db, settings);
    let resolved = engine
        .resolve_conflict(task_id, integration_id, &resolution)
        .await?;

    println!("Resolved with {}: {}", resolution.strategy, resolved.title);
    Ok(())
}

pub async fn run_sync_stats(
    integration: &str,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let integration_id = parse_integration_id(integration)?;
    let db = open_database(db_path).await?;
    let statistics = db.statistics(&integration_id).await?;
    let history = db.history(&integration_id, limit).await?;

    if as_json {
        let payload = serde_json::json!({
            "statistics": statistics,
            "history": history,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!(
        "{} run(s), {} manual; processed {}, succeeded {}, failed {}, conflicts {}",
        statistics.total_runs,
        statistics.manual_runs,
        statistics.processed,
        statistics.succeeded,
        statistics.failed,
        statistics.conflicts
    );
    for run in &history {
        let trigger = if run.manual { "manual" } else { "timer" };
        println!(
            "{}  {trigger:<6}  {}ms  {}",
            format_millis(Some(run.started_at)),
            run.duration_ms,
            format_summary(&run.summary)
        );
    }
    Ok(())
}
