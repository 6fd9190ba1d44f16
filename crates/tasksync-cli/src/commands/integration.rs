use std::path::Path;

use tasksync_core::models::Provider;
use tasksync_core::Integration;

use crate::commands::common::{format_integration_lines, open_database, parse_integration_id};
use crate::error::CliError;

pub async fn run_integration_add(
    provider: &str,
    target: &str,
    workspace: &str,
    interval_secs: Option<u64>,
    db_path: &Path,
) -> Result<(), CliError> {
    let provider = provider.parse::<Provider>()?;
    let target = if provider == Provider::LocalFile {
        absolute_target(target)?
    } else {
        target.trim().to_string()
    };

    let mut integration = Integration::new(workspace, provider, target);
    integration.config.sync_interval = interval_secs;

    let db = open_database(db_path).await?;
    let integration = db.create_integration(&integration).await?;
    println!("{}", integration.id);
    Ok(())
}

/// Local directories are stored absolute so `run` works from any cwd
fn absolute_target(target: &str) -> Result<String, CliError> {
    let target = target.trim();
    if target.is_empty() {
        return Ok(String::new());
    }
    let path = std::path::absolute(target)?;
    Ok(path.display().to_string())
}

pub async fn run_integration_list(
    workspace: Option<&str>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let integrations = db.list_workspace_integrations(workspace).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&integrations)?);
        return Ok(());
    }

    if integrations.is_empty() {
        println!("No integrations configured.");
        return Ok(());
    }
    for line in format_integration_lines(&integrations) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_integration_set_enabled(
    id: &str,
    enabled: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let integration_id = parse_integration_id(id)?;
    let db = open_database(db_path).await?;
    db.set_integration_enabled(&integration_id, enabled).await?;

    let state = if enabled { "enabled" } else { "disabled" };
    println!("Sync {state} for {integration_id}");
    Ok(())
}
