//! Dynamic NTK scaling: rescale the base rather than the positions.

use ropekit_common::{DynamicNtkScaling, RotaryConfig};

use crate::FrequencyTable;
use crate::freq::{extended_rows, inverse_frequencies};

/// `base · ((factor · max_len / max_position) − (factor − 1))^(d / (d − 2))`
/// with `max_len = max_position · factor`.
pub fn scaled_base(base: f64, rotary_dim: usize, max_position: usize, factor: f64) -> f64 {
    let max_len = max_position as f64 * factor;
    let dim = rotary_dim as f64;
    let alpha = factor * max_len / max_position as f64 - (factor - 1.0);
    base * alpha.powf(dim / (dim - 2.0))
}

/// Default-style table over `[0, max_position · factor)` using the rescaled base.
pub fn build(config: &RotaryConfig, params: &DynamicNtkScaling) -> FrequencyTable {
    let base = scaled_base(
        config.base,
        config.rotary_dim,
        config.max_position_embeddings,
        params.factor,
    );
    let inv_freq = inverse_frequencies(base, config.rotary_dim);
    let rows = extended_rows(config.max_position_embeddings, params.factor);
    FrequencyTable::from_angles(&inv_freq, (0..rows).map(|t| t as f64), 1.0)
}
