//! Inbound message handling

pub mod audit_worker;

pub use audit_worker::{AuditMessageSender, AuditMessageWorker, AuditWorkerConfig};
