//! Sync run statistics

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

use super::IntegrationId;

/// Aggregate outcome of draining the sync queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub conflicts: u32,
}

impl AddAssign for SyncSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.processed += rhs.processed;
        self.succeeded += rhs.succeeded;
        self.failed += rhs.failed;
        self.conflicts += rhs.conflicts;
    }
}

/// One recorded scheduler run for an integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub integration_id: IntegrationId,
    /// Run start (Unix ms)
    pub started_at: i64,
    pub duration_ms: u64,
    /// Triggered manually rather than by the interval timer
    pub manual: bool,
    pub summary: SyncSummary,
}

/// Accumulated counters for an integration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatistics {
    pub total_runs: u64,
    pub manual_runs: u64,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub conflicts: u64,
    pub last_run_at: Option<i64>,
    pub last_duration_ms: Option<u64>,
}

impl SyncStatistics {
    /// Fold one run into the counters
    pub fn record(&mut self, run: &SyncRun) {
        self.total_runs += 1;
        if run.manual {
            self.manual_runs += 1;
        }
        self.processed += u64::from(run.summary.processed);
        self.succeeded += u64::from(run.summary.succeeded);
        self.failed += u64::from(run.summary.failed);
        self.conflicts += u64::from(run.summary.conflicts);
        self.last_run_at = Some(run.started_at);
        self.last_duration_ms = Some(run.duration_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_accumulates_runs() {
        let integration_id = IntegrationId::new();
        let mut stats = SyncStatistics::default();
        let summary = SyncSummary {
            processed: 3,
            succeeded: 2,
            failed: 1,
            conflicts: 0,
        };

        stats.record(&SyncRun {
            integration_id,
            started_at: 100,
            duration_ms: 12,
            manual: false,
            summary,
        });
        stats.record(&SyncRun {
            integration_id,
            started_at: 200,
            duration_ms: 8,
            manual: true,
            summary,
        });

        assert_eq!(
            stats,
            SyncStatistics {
                total_runs: 2,
                manual_runs: 1,
                processed: 6,
                succeeded: 4,
                failed: 2,
                conflicts: 0,
                last_run_at: Some(200),
                last_duration_ms: Some(8),
            }
        );
    }
}
