//! Desensitization rules referenced by push fields

use serde::{Deserialize, Serialize};

/// How a masking rule obscures a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum MaskingMethod {
    /// Every character becomes `*`.
    All,
    /// Keep prefix and suffix, replace the middle with `middle_bits` stars.
    /// Values shorter than `min_length` are masked entirely.
    Middle {
        #[serde(rename = "middleBits")]
        middle_bits: u32,
        #[serde(rename = "minLength", default)]
        min_length: u32,
    },
    /// Replace `head_bits` leading and `tail_bits` trailing characters.
    HeadTail {
        #[serde(rename = "headBits")]
        head_bits: u32,
        #[serde(rename = "tailBits")]
        tail_bits: u32,
    },
}

/// A masking rule owned by the external rule service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesensitizationRule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub method: MaskingMethod,
}
