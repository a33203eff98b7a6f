//! Llama 3 wavelength-banded frequency scaling.

use std::f64::consts::PI;

use ropekit_common::{Llama3Scaling, RotaryConfig};

use crate::FrequencyTable;
use crate::freq::inverse_frequencies as default_inverse_frequencies;

/// Keep short wavelengths, divide long ones by the factor, and blend the band
/// in between by the smoothing ratio.
pub fn inverse_frequencies(base: f64, rotary_dim: usize, params: &Llama3Scaling) -> Vec<f64> {
    let original = params.original_max_position as f64;
    let low_freq_wavelen = original / params.low_freq_factor;
    let high_freq_wavelen = original / params.high_freq_factor;
    #[allow(clippy::float_cmp)]
    let flat_band = params.low_freq_factor == params.high_freq_factor;

    default_inverse_frequencies(base, rotary_dim)
        .into_iter()
        .map(|inv_freq| {
            let wavelen = 2.0 * PI / inv_freq;
            if wavelen < high_freq_wavelen {
                inv_freq
            } else if wavelen > low_freq_wavelen {
                inv_freq / params.factor
            } else {
                let smooth = if flat_band {
                    0.0
                } else {
                    (original / wavelen - params.low_freq_factor)
                        / (params.high_freq_factor - params.low_freq_factor)
                };
                (1.0 - smooth) * inv_freq / params.factor + smooth * inv_freq
            }
        })
        .collect()
}

/// Table over `[0, max_position)`.
pub fn build(config: &RotaryConfig, params: &Llama3Scaling) -> FrequencyTable {
    let inv_freq = inverse_frequencies(config.base, config.rotary_dim, params);
    FrequencyTable::from_angles(
        &inv_freq,
        (0..config.max_position_embeddings).map(|t| t as f64),
        1.0,
    )
}
