//! tasksync CLI - manage tasks and keep them in sync with external trackers

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use tasksync_core::sync::SyncOperation;

use crate::cli::{Cli, Commands, IntegrationCommands, SyncCommands, TaskCommands};
use crate::commands::common::{load_settings, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::integration::{
    run_integration_add, run_integration_list, run_integration_set_enabled,
};
use crate::commands::run::run_scheduler;
use crate::commands::sync::{
    run_sync_conflicts, run_sync_now, run_sync_resolve, run_sync_stats, run_sync_status,
};
use crate::commands::task::{run_task_add, run_task_edit, run_task_list, run_task_show, TaskEdit};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "tasksync=info"
            .parse()
            .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?,
    );
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let db_path = resolve_db_path(cli.db_path)?;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Task { command } => match command {
            TaskCommands::Add {
                title,
                workspace,
                content,
            } => run_task_add(&title, &workspace, content, &db_path).await?,
            TaskCommands::List {
                workspace,
                all,
                json,
            } => run_task_list(&workspace, all, json, &db_path).await?,
            TaskCommands::Show { id, json } => run_task_show(&id, json, &db_path).await?,
            TaskCommands::Edit {
                id,
                title,
                content,
                status,
                archive,
                unarchive,
            } => {
                let edit = TaskEdit {
                    title,
                    content,
                    status,
                    archive,
                    unarchive,
                };
                run_task_edit(&id, edit, &db_path).await?;
            }
        },
        Commands::Integration { command } => match command {
            IntegrationCommands::Add {
                provider,
                target,
                workspace,
                interval,
            } => run_integration_add(&provider, &target, &workspace, interval, &db_path).await?,
            IntegrationCommands::List { workspace, json } => {
                run_integration_list(workspace.as_deref(), json, &db_path).await?;
            }
            IntegrationCommands::Enable { id } => {
                run_integration_set_enabled(&id, true, &db_path).await?;
            }
            IntegrationCommands::Disable { id } => {
                run_integration_set_enabled(&id, false, &db_path).await?;
            }
        },
        Commands::Sync { command } => {
            let settings = load_settings(config_path)?;
            match command {
                SyncCommands::Push { task, integration } => {
                    run_sync_now(SyncOperation::Push, &task, &integration, settings, &db_path)
                        .await?;
                }
                SyncCommands::Pull { task, integration } => {
                    run_sync_now(SyncOperation::Pull, &task, &integration, settings, &db_path)
                        .await?;
                }
                SyncCommands::Status {
                    task,
                    integration,
                    json,
                } => run_sync_status(&task, &integration, json, settings, &db_path).await?,
                SyncCommands::Conflicts {
                    task,
                    integration,
                    json,
                } => {
                    let pair = task.as_deref().zip(integration.as_deref());
                    run_sync_conflicts(pair, json, settings, &db_path).await?;
                }
                SyncCommands::Resolve {
                    task,
                    integration,
                    strategy,
                    title,
                    content,
                } => {
                    run_sync_resolve(
                        &task,
                        &integration,
                        &strategy,
                        title,
                        content,
                        settings,
                        &db_path,
                    )
                    .await?;
                }
                SyncCommands::Stats {
                    integration,
                    limit,
                    json,
                } => run_sync_stats(&integration, limit, json, &db_path).await?,
            }
        }
        Commands::Run => run_scheduler(load_settings(config_path)?, &db_path).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
