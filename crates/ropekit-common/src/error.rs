//! Error types for RoPE configuration, table construction and rotation.

use thiserror::Error;

/// Errors produced anywhere in the ropekit stack.
#[derive(Debug, Error)]
pub enum RopeError {
    #[error("unknown RoPE scaling type `{0}`")]
    UnknownRopeType(String),

    #[error("rope_scaling for `{rope_type}` is missing required key `{key}`")]
    MissingScalingKey { rope_type: &'static str, key: &'static str },

    #[error("rotary dimension must be greater than zero")]
    ZeroDimension,

    #[error("rotary dimension must be even, got {dim}")]
    OddDimension { dim: usize },

    #[error("rotary dimension {rotary_dim} exceeds head size {head_size}")]
    RotaryDimExceedsHead { rotary_dim: usize, head_size: usize },

    #[error("dynamic NTK scaling needs a rotary dimension greater than 2, got {dim}")]
    DynamicDimensionTooSmall { dim: usize },

    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },

    #[error("{name} must be greater than zero, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("{rope_type} scaling needs a base greater than 1, got {base}")]
    CorrectionBaseTooSmall { rope_type: &'static str, base: f64 },

    #[error("linear scaling needs at least one factor")]
    EmptyScalingFactors,

    #[error("{name} has {got} entries, expected {expected}")]
    FactorLength { name: &'static str, expected: usize, got: usize },

    #[error("longrope does not support rotary_dim != head_size ({rotary_dim} != {head_size})")]
    LongRopePartialRotary { rotary_dim: usize, head_size: usize },

    #[error("longrope only supports neox-style rotation")]
    LongRopeRequiresNeox,

    #[error("position {position} is out of range for a table of {table_len} rows")]
    PositionOutOfRange { position: i64, table_len: usize },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("unsupported dtype `{0}`")]
    UnsupportedDType(String),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RopeError {
    /// True for errors that reject a configuration before any table is built.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownRopeType(_)
                | Self::MissingScalingKey { .. }
                | Self::ZeroDimension
                | Self::OddDimension { .. }
                | Self::RotaryDimExceedsHead { .. }
                | Self::DynamicDimensionTooSmall { .. }
                | Self::NonFinite { .. }
                | Self::NonPositive { .. }
                | Self::CorrectionBaseTooSmall { .. }
                | Self::EmptyScalingFactors
                | Self::FactorLength { .. }
                | Self::LongRopePartialRotary { .. }
                | Self::LongRopeRequiresNeox
                | Self::UnsupportedDType(_)
        )
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, RopeError>;

/// Reject non-finite and non-positive parameters.
pub fn ensure_positive(name: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(RopeError::NonFinite { name, value });
    }
    if value <= 0.0 {
        return Err(RopeError::NonPositive { name, value });
    }
    Ok(value)
}

/// Reject non-finite parameters; zero and negative values are allowed.
pub fn ensure_finite(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() { Ok(value) } else { Err(RopeError::NonFinite { name, value }) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        insta::assert_snapshot!(
            RopeError::UnknownRopeType("ntk-by-parts".to_string()).to_string(),
            @"unknown RoPE scaling type `ntk-by-parts`"
        );
        insta::assert_snapshot!(
            RopeError::MissingScalingKey { rope_type: "llama3", key: "low_freq_factor" }
                .to_string(),
            @"rope_scaling for `llama3` is missing required key `low_freq_factor`"
        );
        insta::assert_snapshot!(
            RopeError::LongRopePartialRotary { rotary_dim: 32, head_size: 64 }.to_string(),
            @"longrope does not support rotary_dim != head_size (32 != 64)"
        );
        insta::assert_snapshot!(
            RopeError::CorrectionBaseTooSmall { rope_type: "yarn", base: 1.0 }.to_string(),
            @"yarn scaling needs a base greater than 1, got 1"
        );
        insta::assert_snapshot!(
            RopeError::PositionOutOfRange { position: 2048, table_len: 2048 }.to_string(),
            @"position 2048 is out of range for a table of 2048 rows"
        );
    }

    #[test]
    fn config_errors_are_classified() {
        assert!(RopeError::LongRopeRequiresNeox.is_config_error());
        assert!(RopeError::OddDimension { dim: 3 }.is_config_error());
        assert!(!RopeError::PositionOutOfRange { position: -1, table_len: 4 }.is_config_error());
        assert!(!RopeError::ShapeMismatch("x".into()).is_config_error());
    }

    #[test]
    fn ensure_positive_rejects_bad_values() {
        assert!(matches!(ensure_positive("factor", f64::NAN), Err(RopeError::NonFinite { .. })));
        assert!(matches!(
            ensure_positive("factor", f64::INFINITY),
            Err(RopeError::NonFinite { .. })
        ));
        assert!(matches!(ensure_positive("factor", 0.0), Err(RopeError::NonPositive { .. })));
        assert!(matches!(ensure_positive("factor", -2.0), Err(RopeError::NonPositive { .. })));
        assert_eq!(ensure_positive("factor", 4.0).unwrap(), 4.0);
        assert_eq!(ensure_finite("mscale_all_dim", 0.0).unwrap(), 0.0);
    }
}
