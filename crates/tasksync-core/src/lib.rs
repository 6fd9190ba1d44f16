//! tasksync-core - Core library for tasksync
//!
//! This crate contains the task and integration models, the provider adapters,
//! the sync engine with its retry queue and conflict handling, the scheduler,
//! and the libSQL persistence layer used by the CLI.

pub mod adapter;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Integration, IntegrationId, Provider, Task, TaskId};
