//! Sync run history repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite stores counters and LIMIT as i64

use crate::error::Result;
use crate::models::{IntegrationId, SyncRun, SyncStatistics, SyncSummary};
use libsql::{params, Connection, Row};

use super::values::{count, flag, parse_column};

/// libSQL storage for sync run history
pub struct LibSqlSyncStatsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncStatsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn record_run(&self, run: &SyncRun) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_runs (
                    integration_id, started_at, duration_ms, manual,
                    processed, succeeded, failed, conflicts
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    run.integration_id.as_str(),
                    run.started_at,
                    run.duration_ms as i64,
                    flag(run.manual),
                    i64::from(run.summary.processed),
                    i64::from(run.summary.succeeded),
                    i64::from(run.summary.failed),
                    i64::from(run.summary.conflicts),
                ],
            )
            .await?;
        Ok(())
    }

    /// Aggregate counters over every recorded run
    pub async fn statistics(&self, integration_id: &IntegrationId) -> Result<SyncStatistics> {
        let mut stats = SyncStatistics::default();
        let mut rows = self
            .conn
            .query(
                "SELECT integration_id, started_at, duration_ms, manual,
                        processed, succeeded, failed, conflicts
                 FROM sync_runs WHERE integration_id = ?
                 ORDER BY started_at ASC, id ASC",
                [integration_id.as_str()],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            stats.record(&Self::parse_run(&row)?);
        }
        Ok(stats)
    }

    /// Most recent runs first
    pub async fn history(&self, integration_id: &IntegrationId, limit: usize) -> Result<Vec<SyncRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT integration_id, started_at, duration_ms, manual,
                        processed, succeeded, failed, conflicts
                 FROM sync_runs WHERE integration_id = ?
                 ORDER BY started_at DESC, id DESC
                 LIMIT ?",
                params![integration_id.as_str(), limit as i64],
            )
            .await?;

        let mut runs = Vec::new();
        while let Some(row) = rows.next().await? {
            runs.push(Self::parse_run(&row)?);
        }
        Ok(runs)
    }

    fn parse_run(row: &Row) -> Result<SyncRun> {
        let integration_id: String = row.get(0)?;
        let duration_ms: i64 = row.get(2)?;

        Ok(SyncRun {
            integration_id: parse_column(&integration_id, "integration id")?,
            started_at: row.get(1)?,
            duration_ms: u64::try_from(duration_ms).unwrap_or_default(),
            manual: row.get::<i64>(3)? != 0,
            summary: SyncSummary {
                processed: count(row.get(4)?),
                succeeded: count(row.get(5)?),
                failed: count(row.get(6)?),
                conflicts: count(row.get(7)?),
            },
        })
    }
}
