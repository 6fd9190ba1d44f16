//! In-memory sync work queue.
//!
//! Ready entries are ordered by priority (lower runs sooner) and FIFO within a
//! priority. Retries wait in a second heap keyed by due time until
//! [`SyncQueue::promote_due`] moves them back into the ready heap.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::{IntegrationId, SyncKey};

/// Priority used by immediate syncs
pub const IMMEDIATE_PRIORITY: u8 = 0;

/// Sync direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    /// Internal to external
    Push,
    /// External to internal
    Pull,
}

impl SyncOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }

    /// Priority used when the caller does not pick one
    pub const fn default_priority(self) -> u8 {
        match self {
            Self::Push => 1,
            Self::Pull => 2,
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push" => Ok(Self::Push),
            "pull" => Ok(Self::Pull),
            other => Err(Error::InvalidInput(format!(
                "unknown sync operation '{other}' (expected push or pull)"
            ))),
        }
    }
}

/// Per-enqueue overrides; unset fields fall back to engine settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueOptions {
    pub priority: Option<u8>,
    pub max_retries: Option<u32>,
    pub backoff_multiplier: Option<u32>,
    pub timeout: Option<Duration>,
}

impl QueueOptions {
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One unit of queued work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedSync {
    pub key: SyncKey,
    pub operation: SyncOperation,
    pub priority: u8,
    /// Retries already scheduled for this entry
    pub retry_count: u32,
    pub max_retries: u32,
    pub backoff_multiplier: u32,
    pub timeout: Duration,
    /// When the entry became eligible to run (Unix ms)
    pub scheduled_at: i64,
}

impl QueuedSync {
    pub const fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Backoff before retry number `retry_count` (1-based), capped at `max`.
///
/// `2^retry_count * 1000ms * multiplier`, saturating.
pub fn retry_delay(retry_count: u32, backoff_multiplier: u32, max: Duration) -> Duration {
    let cap = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    let millis = 2_u64
        .checked_pow(retry_count)
        .unwrap_or(u64::MAX)
        .saturating_mul(1_000)
        .saturating_mul(u64::from(backoff_multiplier));
    Duration::from_millis(millis.min(cap))
}

#[derive(Debug)]
struct Ready {
    rank: Reverse<(u8, u64)>,
    entry: QueuedSync,
}

#[derive(Debug)]
struct Delayed {
    rank: Reverse<(i64, u64)>,
    entry: QueuedSync,
}

macro_rules! order_by_rank {
    ($slot:ty) => {
        impl PartialEq for $slot {
            fn eq(&self, other: &Self) -> bool {
                self.rank == other.rank
            }
        }

        impl Eq for $slot {}

        impl PartialOrd for $slot {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $slot {
            fn cmp(&self, other: &Self) -> Ordering {
                self.rank.cmp(&other.rank)
            }
        }
    };
}

order_by_rank!(Ready);
order_by_rank!(Delayed);

/// Priority queue with delayed retries
#[derive(Debug)]
pub struct SyncQueue {
    ready: BinaryHeap<Ready>,
    delayed: BinaryHeap<Delayed>,
    capacity: usize,
    seq: u64,
}

impl SyncQueue {
    pub const fn new(capacity: usize) -> Self {
        Self {
            ready: BinaryHeap::new(),
            delayed: BinaryHeap::new(),
            capacity,
            seq: 0,
        }
    }

    /// Total entries, ready and delayed
    pub fn len(&self) -> usize {
        self.ready.len() + self.delayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Due time of the earliest delayed entry
    pub fn next_due_at(&self) -> Option<i64> {
        self.delayed.peek().map(|slot| slot.rank.0 .0)
    }

    /// Make an entry ready to run
    pub fn push(&mut self, entry: QueuedSync) {
        let seq = self.next_seq();
        self.ready.push(Ready {
            rank: Reverse((entry.priority, seq)),
            entry,
        });
    }

    /// Park an entry until `due_at`.
    ///
    /// Returns false, dropping the entry, when the queue is at capacity.
    pub fn schedule(&mut self, entry: QueuedSync, due_at: i64) -> bool {
        if self.len() >= self.capacity {
            return false;
        }
        let seq = self.next_seq();
        self.delayed.push(Delayed {
            rank: Reverse((due_at, seq)),
            entry,
        });
        true
    }

    /// Move every delayed entry due at or before `now` into the ready heap
    pub fn promote_due(&mut self, now: i64) -> usize {
        let mut promoted = 0;
        while self
            .delayed
            .peek()
            .is_some_and(|slot| slot.rank.0 .0 <= now)
        {
            if let Some(Delayed { mut entry, .. }) = self.delayed.pop() {
                entry.scheduled_at = now;
                self.push(entry);
                promoted += 1;
            }
        }
        promoted
    }

    pub fn pop_ready(&mut self) -> Option<QueuedSync> {
        self.ready.pop().map(|slot| slot.entry)
    }

    /// Highest-ranked ready entry of one integration; other entries keep their rank
    pub fn pop_ready_for(&mut self, integration_id: &IntegrationId) -> Option<QueuedSync> {
        let mut skipped = Vec::new();
        let found = loop {
            match self.ready.pop() {
                Some(slot) if slot.entry.key.integration_id == *integration_id => {
                    break Some(slot.entry);
                }
                Some(slot) => skipped.push(slot),
                None => break None,
            }
        };
        self.ready.extend(skipped);
        found
    }

    /// Drop all work for one integration, returning how many entries went
    pub fn clear_integration(&mut self, integration_id: &IntegrationId) -> usize {
        let before = self.len();
        self.ready
            .retain(|slot| slot.entry.key.integration_id != *integration_id);
        self.delayed
            .retain(|slot| slot.entry.key.integration_id != *integration_id);
        before - self.len()
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}
