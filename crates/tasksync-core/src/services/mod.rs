//! Application-level services

mod database;

pub use database::DatabaseService;
