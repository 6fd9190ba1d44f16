use std::path::Path;
use std::sync::Arc;

use tasksync_core::config::SyncSettings;
use tasksync_core::scheduler::SyncScheduler;

use crate::commands::common::{build_engine, open_database};
use crate::error::CliError;

pub async fn run_scheduler(settings: SyncSettings, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let engine = build_engine(&db, settings);
    let store = Arc::new(db);
    let scheduler = SyncScheduler::new(engine, store.clone(), store);

    let started = scheduler.start().await?;
    if started == 0 {
        println!("No enabled integrations to sync.");
        return Ok(());
    }

    println!("Syncing {started} integration(s); press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    scheduler.stop();
    Ok(())
}
