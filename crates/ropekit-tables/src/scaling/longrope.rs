//! LongRoPE: independent "short" and "long" tables stored back to back.

use ropekit_common::{LongRopeScaling, RotaryConfig};

use crate::freq::{longrope_mscale, position_frequencies};
use crate::{FrequencyTable, TableLayout};

/// `1 / (rescale[i] · base^(2i / head_size))`.
pub fn inverse_frequencies(base: f64, head_size: usize, rescale_factors: &[f64]) -> Vec<f64> {
    position_frequencies(base, head_size)
        .into_iter()
        .zip(rescale_factors)
        .map(|(pos_freq, factor)| 1.0 / (factor * pos_freq))
        .collect()
}

/// Short table over `[0, original)` followed by the long table over
/// `[0, max_position)`. Missing mscales default to [`longrope_mscale`].
pub fn build(config: &RotaryConfig, params: &LongRopeScaling) -> FrequencyTable {
    let original = params.original_max_position;
    let default_mscale = longrope_mscale(config.max_position_embeddings, original);
    let short_mscale = params.short_mscale.unwrap_or(default_mscale);
    let long_mscale = params.long_mscale.unwrap_or(default_mscale);

    let short = FrequencyTable::from_angles(
        &inverse_frequencies(config.base, config.head_size, &params.short_factor),
        (0..original).map(|t| t as f64),
        short_mscale,
    );
    let long = FrequencyTable::from_angles(
        &inverse_frequencies(config.base, config.head_size, &params.long_factor),
        (0..config.max_position_embeddings).map(|t| t as f64),
        long_mscale,
    );

    FrequencyTable::concat(vec![short, long]).with_layout(TableLayout::DualRange {
        short_rows: original,
        short_mscale,
        long_mscale,
    })
}
