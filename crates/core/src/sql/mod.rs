//! SQL synthesis: type mapping, masking and statement generation

pub mod masking;
pub mod synthesis;
pub mod type_mapping;

pub use masking::MaskingRuleApplier;
pub use synthesis::{build_statements, check_primary_key, SqlSynthesisEngine, Synthesis};
pub use type_mapping::{build_mapping, MappingOrigin, TypeDictionary, TypeMappingResolver};
