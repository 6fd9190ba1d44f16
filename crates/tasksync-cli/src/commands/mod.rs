pub mod common;
pub mod completions;
pub mod integration;
pub mod run;
pub mod sync;
pub mod task;
