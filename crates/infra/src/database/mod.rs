//! Database implementations

pub mod manager;
pub mod push_job_repository;

pub use manager::{DbConnection, DbManager};
pub use push_job_repository::SqlitePushJobRepository;
