//! Bidirectional task synchronization.
//!
//! [`SyncEngine`] moves tasks between the internal store and external
//! providers through [`SyncAdapter`](crate::adapter::SyncAdapter)s, keeps one
//! [`SyncMetadata`](crate::models::SyncMetadata) record per (task, integration)
//! pair, retries transient failures with exponential backoff and stops on
//! conflicts until they are resolved explicitly.

pub mod detector;
mod engine;
mod error;
mod locks;
mod queue;
mod resolver;

pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use queue::{
    retry_delay, QueueOptions, QueuedSync, SyncOperation, SyncQueue, IMMEDIATE_PRIORITY,
};
pub use resolver::{ConflictResolver, Resolution, ResolutionStrategy, Resolved};
