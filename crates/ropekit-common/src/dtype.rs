//! Output precision for rotated tensors.

use std::fmt;
use std::str::FromStr;

use candle_core::DType;
use serde::{Deserialize, Serialize};

use crate::{Result, RopeError};

/// Storage precision of the rotated query/key tensors.
///
/// Rotation itself always runs in `f32`; the result is cast to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RopeDType {
    #[default]
    F32,
    F16,
    BF16,
}

impl RopeDType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::F32 => "float32",
            Self::F16 => "float16",
            Self::BF16 => "bfloat16",
        }
    }

    pub fn to_candle(self) -> DType {
        match self {
            Self::F32 => DType::F32,
            Self::F16 => DType::F16,
            Self::BF16 => DType::BF16,
        }
    }
}

impl FromStr for RopeDType {
    type Err = RopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float32" | "f32" | "fp32" | "float" => Ok(Self::F32),
            "float16" | "f16" | "fp16" | "half" => Ok(Self::F16),
            "bfloat16" | "bf16" => Ok(Self::BF16),
            other => Err(RopeError::UnsupportedDType(other.to_string())),
        }
    }
}

impl TryFrom<String> for RopeDType {
    type Error = RopeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RopeDType> for String {
    fn from(value: RopeDType) -> Self {
        value.as_str().to_string()
    }
}

impl From<RopeDType> for DType {
    fn from(value: RopeDType) -> Self {
        value.to_candle()
    }
}

impl fmt::Display for RopeDType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
