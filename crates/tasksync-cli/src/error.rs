use std::io;

use tasksync_core::sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tasksync_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Task title cannot be empty")]
    EmptyTitle,
    #[error("Nothing to update; pass at least one field")]
    EmptyEdit,
    #[error("Invalid {kind} id: {value}")]
    InvalidId { kind: &'static str, value: String },
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Could not resolve a data directory; pass --db-path")]
    NoDataDir,
}
