//! Rotary embedding request and resolved configuration.

use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_ROPE_BASE, Result, RopeDType, RopeError, RopeScaling, RopeScalingConfig,
    ensure_positive,
};

/// Arguments of a rotary embedding request, before validation.
///
/// # Examples
///
/// ```
/// use ropekit_common::{RopeScalingConfig, RopeSpec, RopeType};
///
/// let spec = RopeSpec::new(64, 64, 2048, 10_000.0).with_scaling(
///     RopeScalingConfig::new(RopeType::Yarn).with_factor(2.0).with_original_max_position(1024),
/// );
/// let config = spec.resolve().unwrap();
/// assert_eq!(config.scaling.rope_type(), RopeType::Yarn);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RopeSpec {
    pub head_size: usize,
    pub rotary_dim: usize,
    pub max_position: usize,
    pub base: f64,
    pub is_neox_style: bool,
    pub rope_scaling: Option<RopeScalingConfig>,
    pub dtype: RopeDType,
    pub partial_rotary_factor: f64,
}

impl RopeSpec {
    pub fn new(head_size: usize, rotary_dim: usize, max_position: usize, base: f64) -> Self {
        Self {
            head_size,
            rotary_dim,
            max_position,
            base,
            is_neox_style: true,
            rope_scaling: None,
            dtype: RopeDType::F32,
            partial_rotary_factor: 1.0,
        }
    }

    pub fn with_neox_style(mut self, is_neox_style: bool) -> Self {
        self.is_neox_style = is_neox_style;
        self
    }

    pub fn with_scaling(mut self, rope_scaling: RopeScalingConfig) -> Self {
        self.rope_scaling = Some(rope_scaling);
        self
    }

    pub fn with_dtype(mut self, dtype: RopeDType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_partial_rotary_factor(mut self, partial_rotary_factor: f64) -> Self {
        self.partial_rotary_factor = partial_rotary_factor;
        self
    }

    /// Rotary dimension after applying `partial_rotary_factor` (floored).
    pub fn effective_rotary_dim(&self) -> usize {
        if self.partial_rotary_factor < 1.0 {
            (self.rotary_dim as f64 * self.partial_rotary_factor).floor() as usize
        } else {
            self.rotary_dim
        }
    }

    /// Validate the request and the scaling mapping into a [`RotaryConfig`].
    pub fn resolve(&self) -> Result<RotaryConfig> {
        ensure_positive("partial_rotary_factor", self.partial_rotary_factor)?;
        let scaling = match &self.rope_scaling {
            Some(raw) => raw.validate()?,
            None => RopeScaling::Default,
        };
        let config = RotaryConfig {
            head_size: self.head_size,
            rotary_dim: self.effective_rotary_dim(),
            max_position_embeddings: self.max_position,
            base: self.base,
            is_neox_style: self.is_neox_style,
            dtype: self.dtype,
            scaling,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for RopeSpec {
    fn default() -> Self {
        Self::new(128, 128, 2048, DEFAULT_ROPE_BASE)
    }
}

/// Immutable, validated rotary embedding configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RotaryConfig {
    pub head_size: usize,
    pub rotary_dim: usize,
    pub max_position_embeddings: usize,
    pub base: f64,
    pub is_neox_style: bool,
    pub dtype: RopeDType,
    pub scaling: RopeScaling,
}

impl RotaryConfig {
    /// Plain (unscaled) configuration with neox-style rotation and f32 output.
    pub fn new(head_size: usize, rotary_dim: usize, max_position: usize, base: f64) -> Self {
        Self {
            head_size,
            rotary_dim,
            max_position_embeddings: max_position,
            base,
            is_neox_style: true,
            dtype: RopeDType::F32,
            scaling: RopeScaling::Default,
        }
    }

    pub fn with_scaling(mut self, scaling: RopeScaling) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn half_dim(&self) -> usize {
        self.rotary_dim / 2
    }

    /// Check dimensions, base and the variant-specific constraints.
    ///
    /// LongRoPE restrictions are enforced here so that they fail before any
    /// table is built. YaRN places its correction range with `ln(base)`, so
    /// it needs `base > 1`.
    pub fn validate(&self) -> Result<()> {
        if self.rotary_dim == 0 {
            return Err(RopeError::ZeroDimension);
        }
        if !self.rotary_dim.is_multiple_of(2) {
            return Err(RopeError::OddDimension { dim: self.rotary_dim });
        }
        if self.rotary_dim > self.head_size {
            return Err(RopeError::RotaryDimExceedsHead {
                rotary_dim: self.rotary_dim,
                head_size: self.head_size,
            });
        }
        ensure_positive("base", self.base)?;

        match &self.scaling {
            RopeScaling::Dynamic(_) if self.rotary_dim <= 2 => {
                Err(RopeError::DynamicDimensionTooSmall { dim: self.rotary_dim })
            }
            RopeScaling::Yarn(_) | RopeScaling::DeepseekYarn(_) if self.base <= 1.0 => {
                Err(RopeError::CorrectionBaseTooSmall {
                    rope_type: self.scaling.rope_type().as_str(),
                    base: self.base,
                })
            }
            RopeScaling::LongRope(params) => {
                if self.rotary_dim != self.head_size {
                    return Err(RopeError::LongRopePartialRotary {
                        rotary_dim: self.rotary_dim,
                        head_size: self.head_size,
                    });
                }
                if !self.is_neox_style {
                    return Err(RopeError::LongRopeRequiresNeox);
                }
                let expected = self.half_dim();
                for (name, factors) in
                    [("short_factor", &params.short_factor), ("long_factor", &params.long_factor)]
                {
                    if factors.len() != expected {
                        return Err(RopeError::FactorLength { name, expected, got: factors.len() });
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RopeType;

    fn longrope(half: usize) -> RopeScalingConfig {
        RopeScalingConfig::new(RopeType::Longrope)
            .with_original_max_position(4096)
            .with_range_factors(vec![1.0; half], vec![2.0; half])
    }

    #[test]
    fn partial_rotary_factor_floors_rotary_dim() {
        let spec = RopeSpec::new(80, 80, 2048, 10_000.0).with_partial_rotary_factor(0.4);
        assert_eq!(spec.effective_rotary_dim(), 32);
        assert_eq!(spec.resolve().unwrap().rotary_dim, 32);

        // Factors at or above one leave the dimension alone.
        let spec = RopeSpec::new(64, 64, 2048, 10_000.0).with_partial_rotary_factor(1.5);
        assert_eq!(spec.effective_rotary_dim(), 64);
    }

    #[test]
    fn missing_scaling_resolves_to_default() {
        let config = RopeSpec::new(64, 64, 2048, 10_000.0).resolve().unwrap();
        assert_eq!(config.scaling, RopeScaling::Default);
        assert_eq!(config.half_dim(), 32);
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert!(matches!(
            RopeSpec::new(64, 0, 16, 10_000.0).resolve(),
            Err(RopeError::ZeroDimension)
        ));
        assert!(matches!(
            RopeSpec::new(64, 63, 16, 10_000.0).resolve(),
            Err(RopeError::OddDimension { dim: 63 })
        ));
        assert!(matches!(
            RopeSpec::new(32, 64, 16, 10_000.0).resolve(),
            Err(RopeError::RotaryDimExceedsHead { rotary_dim: 64, head_size: 32 })
        ));
        assert!(matches!(
            RopeSpec::new(64, 64, 16, 0.0).resolve(),
            Err(RopeError::NonPositive { name: "base", .. })
        ));
    }

    #[test]
    fn dynamic_needs_more_than_two_dims() {
        let spec = RopeSpec::new(2, 2, 16, 10_000.0)
            .with_scaling(RopeScalingConfig::new(RopeType::Dynamic).with_factor(2.0));
        assert!(matches!(spec.resolve(), Err(RopeError::DynamicDimensionTooSmall { dim: 2 })));
    }

    #[test]
    fn yarn_variants_need_base_above_one() {
        for rope_type in [RopeType::Yarn, RopeType::DeepseekYarn] {
            let scaling = RopeScalingConfig::new(rope_type)
                .with_factor(2.0)
                .with_original_max_position(1024);
            for base in [1.0, 0.5] {
                let spec = RopeSpec::new(64, 64, 2048, base).with_scaling(scaling.clone());
                assert!(
                    matches!(spec.resolve(), Err(RopeError::CorrectionBaseTooSmall { .. })),
                    "{rope_type} accepted base {base}"
                );
            }
            let spec = RopeSpec::new(64, 64, 2048, 1.0001).with_scaling(scaling);
            assert!(spec.resolve().is_ok());
        }

        // Unit base is degenerate but finite without a correction range.
        assert!(RopeSpec::new(64, 64, 2048, 1.0).resolve().is_ok());
    }

    #[test]
    fn longrope_constraints_fail_at_resolution() {
        let partial = RopeSpec::new(64, 32, 8192, 10_000.0).with_scaling(longrope(16));
        assert!(matches!(
            partial.resolve(),
            Err(RopeError::LongRopePartialRotary { rotary_dim: 32, head_size: 64 })
        ));

        let gptj = RopeSpec::new(64, 64, 8192, 10_000.0)
            .with_neox_style(false)
            .with_scaling(longrope(32));
        assert!(matches!(gptj.resolve(), Err(RopeError::LongRopeRequiresNeox)));

        let short = RopeSpec::new(64, 64, 8192, 10_000.0).with_scaling(longrope(31));
        assert!(matches!(
            short.resolve(),
            Err(RopeError::FactorLength { name: "short_factor", expected: 32, got: 31 })
        ));

        assert!(RopeSpec::new(64, 64, 8192, 10_000.0).with_scaling(longrope(32)).resolve().is_ok());
    }
}
