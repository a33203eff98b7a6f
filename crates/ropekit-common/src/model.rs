//! Rotary settings read from a model's `config.json`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_ROPE_BASE, Result, RopeDType, RopeError, RopeScalingConfig, RopeSpec};

fn default_rope_theta() -> f64 {
    DEFAULT_ROPE_BASE
}

fn default_partial_rotary_factor() -> f64 {
    1.0
}

/// The rotary-relevant subset of a Hugging Face style model configuration.
///
/// Unknown keys are ignored, so a full `config.json` can be parsed directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRopeConfig {
    pub hidden_size: usize,
    pub num_attention_heads: usize,
    #[serde(default)]
    pub head_dim: Option<usize>,
    pub max_position_embeddings: usize,
    #[serde(default = "default_rope_theta")]
    pub rope_theta: f64,
    #[serde(default = "default_partial_rotary_factor")]
    pub partial_rotary_factor: f64,
    #[serde(default)]
    pub rope_scaling: Option<RopeScalingConfig>,
    #[serde(default)]
    pub torch_dtype: Option<String>,
}

impl ModelRopeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Per-head size: explicit `head_dim`, else `hidden_size / num_attention_heads`.
    pub fn head_size(&self) -> Result<usize> {
        if let Some(head_dim) = self.head_dim {
            return Ok(head_dim);
        }
        if self.num_attention_heads == 0 {
            return Err(RopeError::ShapeMismatch("num_attention_heads is zero".to_string()));
        }
        Ok(self.hidden_size / self.num_attention_heads)
    }

    pub fn dtype(&self) -> Result<RopeDType> {
        self.torch_dtype.as_deref().map_or(Ok(RopeDType::F32), |name| name.parse())
    }

    /// Build the rotary request for this model's attention layers.
    pub fn to_spec(&self, is_neox_style: bool) -> Result<RopeSpec> {
        let head_size = self.head_size()?;
        let mut spec =
            RopeSpec::new(head_size, head_size, self.max_position_embeddings, self.rope_theta)
                .with_neox_style(is_neox_style)
                .with_dtype(self.dtype()?)
                .with_partial_rotary_factor(self.partial_rotary_factor);
        if let Some(scaling) = &self.rope_scaling {
            spec = spec.with_scaling(scaling.clone());
        }
        Ok(spec)
    }
}
