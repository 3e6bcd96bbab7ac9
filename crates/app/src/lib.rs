//! # DataPush App
//!
//! Process layer of the push engine: wires SQLite persistence and the HTTP
//! adapters into the core services and owns the background workers.
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - `AppContext` is the only place concrete adapters are chosen

pub mod context;
pub mod logging;

pub use context::AppContext;
