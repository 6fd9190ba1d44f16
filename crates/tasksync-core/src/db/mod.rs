//! libSQL persistence for tasks, integrations and sync bookkeeping

mod connection;
mod integration_repository;
mod metadata_repository;
mod migrations;
mod stats_repository;
mod task_repository;
mod values;

pub use connection::Database;
pub use integration_repository::LibSqlIntegrationRepository;
pub use metadata_repository::LibSqlSyncMetadataRepository;
pub use stats_repository::LibSqlSyncStatsRepository;
pub use task_repository::LibSqlTaskRepository;
