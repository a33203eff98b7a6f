//! Rope scaling configuration
//!
//! [`RopeScalingConfig`] mirrors the `rope_scaling` mapping found in model
//! configuration files: every key is optional and unknown keys are ignored.
//! [`RopeScalingConfig::validate`] turns it into the closed [`RopeScaling`]
//! union, filling in defaults and rejecting incomplete configurations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Result, RopeError, ensure_finite, ensure_positive};

/// Default RoPE base/theta used by LLaMA-style models.
pub const DEFAULT_ROPE_BASE: f64 = 10_000.0;
/// Default YaRN fast-rotation boundary.
pub const DEFAULT_BETA_FAST: f64 = 32.0;
/// Default YaRN slow-rotation boundary.
pub const DEFAULT_BETA_SLOW: f64 = 1.0;
/// Default Deepseek-YaRN `mscale_all_dim`.
pub const DEFAULT_MSCALE_ALL_DIM: f64 = 0.0;

/// The fixed set of scaling strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RopeType {
    Default,
    Linear,
    Dynamic,
    Yarn,
    DeepseekYarn,
    Llama3,
    Longrope,
}

/// Registered `rope_type` tags.
pub const ROPE_TYPE_REGISTRY: [(&str, RopeType); 7] = [
    ("default", RopeType::Default),
    ("linear", RopeType::Linear),
    ("dynamic", RopeType::Dynamic),
    ("yarn", RopeType::Yarn),
    ("deepseek_yarn", RopeType::DeepseekYarn),
    ("llama3", RopeType::Llama3),
    ("longrope", RopeType::Longrope),
];

impl RopeType {
    pub fn as_str(self) -> &'static str {
        ROPE_TYPE_REGISTRY
            .iter()
            .find_map(|(name, ty)| (*ty == self).then_some(*name))
            .unwrap_or("default")
    }
}

impl FromStr for RopeType {
    type Err = RopeError;

    fn from_str(s: &str) -> Result<Self> {
        ROPE_TYPE_REGISTRY
            .iter()
            .find_map(|(name, ty)| (*name == s).then_some(*ty))
            .ok_or_else(|| RopeError::UnknownRopeType(s.to_string()))
    }
}

impl fmt::Display for RopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scaling factor given either as one number or as a list (linear only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalingFactor {
    Scalar(f64),
    List(Vec<f64>),
}

impl ScalingFactor {
    pub fn to_vec(&self) -> Vec<f64> {
        match self {
            Self::Scalar(f) => vec![*f],
            Self::List(fs) => fs.clone(),
        }
    }

    /// Only linear scaling accepts several factors.
    fn single(&self) -> Result<f64> {
        match self {
            Self::Scalar(f) => Ok(*f),
            Self::List(fs) if fs.len() == 1 => Ok(fs[0]),
            Self::List(fs) => {
                Err(RopeError::FactorLength { name: "factor", expected: 1, got: fs.len() })
            }
        }
    }
}

impl From<f64> for ScalingFactor {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<f64>> for ScalingFactor {
    fn from(value: Vec<f64>) -> Self {
        Self::List(value)
    }
}

/// Raw `rope_scaling` mapping as it appears in model configuration files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RopeScalingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rope_type: Option<String>,
    /// Legacy spelling of `rope_type` used by older Hugging Face configs.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub legacy_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factor: Option<ScalingFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_freq_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_freq_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_max_position_embeddings: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extrapolation_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attn_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta_fast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta_slow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mscale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mscale_all_dim: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_factor: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_factor: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_mscale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_mscale: Option<f64>,
}

impl RopeScalingConfig {
    pub fn new(rope_type: RopeType) -> Self {
        Self { rope_type: Some(rope_type.as_str().to_string()), ..Self::default() }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_factor(mut self, factor: impl Into<ScalingFactor>) -> Self {
        self.factor = Some(factor.into());
        self
    }

    pub fn with_original_max_position(mut self, original: usize) -> Self {
        self.original_max_position_embeddings = Some(original);
        self
    }

    pub fn with_freq_factors(mut self, low: f64, high: f64) -> Self {
        self.low_freq_factor = Some(low);
        self.high_freq_factor = Some(high);
        self
    }

    pub fn with_betas(mut self, beta_fast: f64, beta_slow: f64) -> Self {
        self.beta_fast = Some(beta_fast);
        self.beta_slow = Some(beta_slow);
        self
    }

    pub fn with_attn_factor(mut self, attn_factor: f64) -> Self {
        self.attn_factor = Some(attn_factor);
        self
    }

    pub fn with_extrapolation_factor(mut self, extrapolation_factor: f64) -> Self {
        self.extrapolation_factor = Some(extrapolation_factor);
        self
    }

    pub fn with_mscales(mut self, mscale: f64, mscale_all_dim: f64) -> Self {
        self.mscale = Some(mscale);
        self.mscale_all_dim = Some(mscale_all_dim);
        self
    }

    pub fn with_range_factors(mut self, short_factor: Vec<f64>, long_factor: Vec<f64>) -> Self {
        self.short_factor = Some(short_factor);
        self.long_factor = Some(long_factor);
        self
    }

    pub fn with_range_mscales(mut self, short_mscale: f64, long_mscale: f64) -> Self {
        self.short_mscale = Some(short_mscale);
        self.long_mscale = Some(long_mscale);
        self
    }

    /// Resolve the strategy tag. `rope_type` wins over the legacy `type` key;
    /// neither present means [`RopeType::Default`].
    pub fn rope_type(&self) -> Result<RopeType> {
        match (&self.rope_type, &self.legacy_type) {
            (Some(tag), _) => tag.parse(),
            (None, Some(tag)) => {
                warn!(rope_type = %tag, "rope_scaling uses the legacy `type` key");
                tag.parse()
            }
            (None, None) => Ok(RopeType::Default),
        }
    }

    /// Validate the mapping and produce the tagged scaling variant.
    pub fn validate(&self) -> Result<RopeScaling> {
        let rope_type = self.rope_type()?;
        let scaling = match rope_type {
            RopeType::Default => RopeScaling::Default,
            RopeType::Linear => {
                let factors = self.require_factor(rope_type)?.to_vec();
                if factors.is_empty() {
                    return Err(RopeError::EmptyScalingFactors);
                }
                for &f in &factors {
                    ensure_positive("factor", f)?;
                }
                RopeScaling::Linear(LinearScaling { factors })
            }
            RopeType::Dynamic => {
                let factor = self.require_factor(rope_type)?.single()?;
                let factor = ensure_positive("factor", factor)?;
                RopeScaling::Dynamic(DynamicNtkScaling { factor })
            }
            RopeType::Yarn => RopeScaling::Yarn(self.yarn_params(rope_type)?),
            RopeType::DeepseekYarn => RopeScaling::DeepseekYarn(DeepseekYarnScaling {
                yarn: self.yarn_params(rope_type)?,
                mscale: ensure_finite("mscale", self.mscale.unwrap_or(1.0))?,
                mscale_all_dim: ensure_finite(
                    "mscale_all_dim",
                    self.mscale_all_dim.unwrap_or(DEFAULT_MSCALE_ALL_DIM),
                )?,
            }),
            RopeType::Llama3 => {
                let factor = self.require_factor(rope_type)?.single()?;
                let low = self.low_freq_factor.ok_or(RopeError::MissingScalingKey {
                    rope_type: "llama3",
                    key: "low_freq_factor",
                })?;
                let high = self.high_freq_factor.ok_or(RopeError::MissingScalingKey {
                    rope_type: "llama3",
                    key: "high_freq_factor",
                })?;
                let params = Llama3Scaling {
                    factor: ensure_positive("factor", factor)?,
                    low_freq_factor: ensure_positive("low_freq_factor", low)?,
                    high_freq_factor: ensure_positive("high_freq_factor", high)?,
                    original_max_position: self.require_original(rope_type)?,
                };
                if params.factor < 1.0 {
                    warn!(
                        factor = params.factor,
                        "llama3 scaling factor below 1.0 shortens context"
                    );
                }
                RopeScaling::Llama3(params)
            }
            RopeType::Longrope => {
                let short_factor = self.short_factor.clone().ok_or(
                    RopeError::MissingScalingKey { rope_type: "longrope", key: "short_factor" },
                )?;
                let long_factor = self.long_factor.clone().ok_or(
                    RopeError::MissingScalingKey { rope_type: "longrope", key: "long_factor" },
                )?;
                for &f in short_factor.iter().chain(&long_factor) {
                    ensure_positive("rescale factor", f)?;
                }
                let short_mscale = self.short_mscale.map(|m| ensure_finite("short_mscale", m));
                let long_mscale = self.long_mscale.map(|m| ensure_finite("long_mscale", m));
                RopeScaling::LongRope(LongRopeScaling {
                    original_max_position: self.require_original(rope_type)?,
                    short_factor,
                    long_factor,
                    short_mscale: short_mscale.transpose()?,
                    long_mscale: long_mscale.transpose()?,
                })
            }
        };
        Ok(scaling)
    }

    fn require_factor(&self, rope_type: RopeType) -> Result<&ScalingFactor> {
        self.factor
            .as_ref()
            .ok_or(RopeError::MissingScalingKey { rope_type: rope_type.as_str(), key: "factor" })
    }

    fn require_original(&self, rope_type: RopeType) -> Result<usize> {
        match self.original_max_position_embeddings {
            Some(0) => Err(RopeError::NonPositive {
                name: "original_max_position_embeddings",
                value: 0.0,
            }),
            Some(original) => Ok(original),
            None => Err(RopeError::MissingScalingKey {
                rope_type: rope_type.as_str(),
                key: "original_max_position_embeddings",
            }),
        }
    }

    fn yarn_params(&self, rope_type: RopeType) -> Result<YarnScaling> {
        let factor = self.require_factor(rope_type)?.single()?;
        let params = YarnScaling {
            factor: ensure_positive("factor", factor)?,
            original_max_position: self.require_original(rope_type)?,
            extrapolation_factor: ensure_finite(
                "extrapolation_factor",
                self.extrapolation_factor.unwrap_or(1.0),
            )?,
            attn_factor: ensure_finite("attn_factor", self.attn_factor.unwrap_or(1.0))?,
            beta_fast: ensure_positive("beta_fast", self.beta_fast.unwrap_or(DEFAULT_BETA_FAST))?,
            beta_slow: ensure_positive("beta_slow", self.beta_slow.unwrap_or(DEFAULT_BETA_SLOW))?,
        };
        if params.factor < 1.0 {
            warn!(factor = params.factor, rope_type = %rope_type, "yarn scaling factor below 1.0");
        }
        Ok(params)
    }
}

/// Linear position interpolation, one sub-table per factor.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearScaling {
    pub factors: Vec<f64>,
}

/// Dynamic NTK base rescaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicNtkScaling {
    pub factor: f64,
}

/// YaRN interpolation/extrapolation blend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YarnScaling {
    pub factor: f64,
    pub original_max_position: usize,
    pub extrapolation_factor: f64,
    pub attn_factor: f64,
    pub beta_fast: f64,
    pub beta_slow: f64,
}

/// YaRN with two independent magnitude-scale numerators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeepseekYarnScaling {
    pub yarn: YarnScaling,
    pub mscale: f64,
    pub mscale_all_dim: f64,
}

/// Llama 3 wavelength-banded frequency scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Llama3Scaling {
    pub factor: f64,
    pub low_freq_factor: f64,
    pub high_freq_factor: f64,
    pub original_max_position: usize,
}

/// Dual-range ("short"/"long") tables with per-component rescale factors.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRopeScaling {
    pub original_max_position: usize,
    pub short_factor: Vec<f64>,
    pub long_factor: Vec<f64>,
    pub short_mscale: Option<f64>,
    pub long_mscale: Option<f64>,
}

/// Validated scaling strategy.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RopeScaling {
    #[default]
    Default,
    Linear(LinearScaling),
    Dynamic(DynamicNtkScaling),
    Yarn(YarnScaling),
    DeepseekYarn(DeepseekYarnScaling),
    Llama3(Llama3Scaling),
    LongRope(LongRopeScaling),
}

impl RopeScaling {
    pub fn rope_type(&self) -> RopeType {
        match self {
            Self::Default => RopeType::Default,
            Self::Linear(_) => RopeType::Linear,
            Self::Dynamic(_) => RopeType::Dynamic,
            Self::Yarn(_) => RopeType::Yarn,
            Self::DeepseekYarn(_) => RopeType::DeepseekYarn,
            Self::Llama3(_) => RopeType::Llama3,
            Self::LongRope(_) => RopeType::Longrope,
        }
    }

    /// Flatten every parameter into bit patterns so the variant can be hashed.
    ///
    /// List-valued parameters are length-prefixed; optional ones carry a
    /// presence word.
    pub fn canonical_words(&self) -> Vec<u64> {
        fn push_opt(words: &mut Vec<u64>, value: Option<f64>) {
            match value {
                Some(v) => words.extend([1, v.to_bits()]),
                None => words.push(0),
            }
        }
        fn push_list(words: &mut Vec<u64>, values: &[f64]) {
            words.push(values.len() as u64);
            words.extend(values.iter().map(|v| v.to_bits()));
        }
        fn push_yarn(words: &mut Vec<u64>, y: &YarnScaling) {
            words.extend([
                y.factor.to_bits(),
                y.original_max_position as u64,
                y.extrapolation_factor.to_bits(),
                y.attn_factor.to_bits(),
                y.beta_fast.to_bits(),
                y.beta_slow.to_bits(),
            ]);
        }

        let mut words = vec![self.rope_type() as u64];
        match self {
            Self::Default => {}
            Self::Linear(p) => push_list(&mut words, &p.factors),
            Self::Dynamic(p) => words.push(p.factor.to_bits()),
            Self::Yarn(p) => push_yarn(&mut words, p),
            Self::DeepseekYarn(p) => {
                push_yarn(&mut words, &p.yarn);
                words.extend([p.mscale.to_bits(), p.mscale_all_dim.to_bits()]);
            }
            Self::Llama3(p) => words.extend([
                p.factor.to_bits(),
                p.low_freq_factor.to_bits(),
                p.high_freq_factor.to_bits(),
                p.original_max_position as u64,
            ]),
            Self::LongRope(p) => {
                words.push(p.original_max_position as u64);
                push_list(&mut words, &p.short_factor);
                push_list(&mut words, &p.long_factor);
                push_opt(&mut words, p.short_mscale);
                push_opt(&mut words, p.long_mscale);
            }
        }
        words
    }
}

#[cfg(test)]
mod tests;
