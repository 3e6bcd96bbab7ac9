//! HTTP adapters for the external collaborators
//!
//! One client per port. They share a single [`HttpClient`](crate::http::HttpClient)
//! and the `{code, msg, data}` envelope reader.

pub mod audit;
pub mod callback;
pub mod error;
pub mod masking;
pub mod sync_engine;
pub mod type_mapping;

mod envelope;

pub use audit::AuditClient;
pub use callback::CallbackClient;
pub use error::{ClientError, ClientErrorCategory};
pub use masking::MaskingRuleClient;
pub use sync_engine::SyncEngineClient;
pub use type_mapping::TypeMappingClient;
