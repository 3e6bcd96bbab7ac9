//! # DataPush Domain
//!
//! Business domain types for the push-job engine.
//!
//! This crate contains:
//! - Push job aggregate, fields, schedules and lifecycle enums
//! - Payloads exchanged with external collaborators
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other DataPush crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
