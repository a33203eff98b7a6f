//! Table builders, one module per scaling strategy.
//!
//! Dispatch is a single `match` over the closed [`RopeScaling`] union.

pub mod default;
pub mod dynamic;
pub mod linear;
pub mod llama3;
pub mod longrope;
pub mod yarn;

use ropekit_common::{Result, RopeScaling, RotaryConfig};
use tracing::debug;

use crate::FrequencyTable;

/// Validate `config` and build its cosine/sine table.
pub fn build_table(config: &RotaryConfig) -> Result<FrequencyTable> {
    config.validate()?;

    let table = match &config.scaling {
        RopeScaling::Default => {
            default::build(config.base, config.rotary_dim, config.max_position_embeddings)
        }
        RopeScaling::Linear(params) => linear::build(config, params),
        RopeScaling::Dynamic(params) => dynamic::build(config, params),
        RopeScaling::Yarn(params) => yarn::build(config, params),
        RopeScaling::DeepseekYarn(params) => yarn::build_deepseek(config, params)?,
        RopeScaling::Llama3(params) => llama3::build(config, params),
        RopeScaling::LongRope(params) => longrope::build(config, params),
    };

    debug!(
        rope_type = %config.scaling.rope_type(),
        rotary_dim = config.rotary_dim,
        rows = table.rows,
        "built RoPE table"
    );
    Ok(table)
}
