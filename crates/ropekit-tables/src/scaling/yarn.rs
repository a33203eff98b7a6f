//! YaRN and Deepseek-YaRN: blend interpolated and extrapolated frequencies
//! across the correction range, then correct the magnitude.

use ropekit_common::{DeepseekYarnScaling, Result, RopeError, RotaryConfig, YarnScaling};

use crate::FrequencyTable;
use crate::freq::{correction_range, extended_rows, linear_ramp_mask, mscale, position_frequencies};

/// Blended inverse frequencies; `original_max_position` from `params` sets
/// the correction range.
pub fn inverse_frequencies(base: f64, rotary_dim: usize, params: &YarnScaling) -> Vec<f64> {
    let pos_freqs = position_frequencies(base, rotary_dim);
    let (low, high) = correction_range(
        params.beta_fast,
        params.beta_slow,
        rotary_dim,
        base,
        params.original_max_position,
    );
    let ramp = linear_ramp_mask(low, high, rotary_dim / 2);

    pos_freqs
        .iter()
        .zip(ramp)
        .map(|(&pos_freq, ramp)| {
            let extrapolation = 1.0 / pos_freq;
            let interpolation = 1.0 / (params.factor * pos_freq);
            let mask = (1.0 - ramp) * params.extrapolation_factor;
            interpolation * (1.0 - mask) + extrapolation * mask
        })
        .collect()
}

fn table(config: &RotaryConfig, params: &YarnScaling, scale: f64) -> FrequencyTable {
    let inv_freq = inverse_frequencies(config.base, config.rotary_dim, params);
    let rows = extended_rows(params.original_max_position, params.factor);
    FrequencyTable::from_angles(&inv_freq, (0..rows).map(|t| t as f64), scale)
}

/// Magnitude applied to both `cos` and `sin`: `mscale(factor) · attn_factor`.
pub fn magnitude(params: &YarnScaling) -> f64 {
    mscale(params.factor, 1.0) * params.attn_factor
}

/// Deepseek magnitude: `mscale(factor, mscale) / mscale(factor, mscale_all_dim) · attn_factor`.
pub fn deepseek_magnitude(params: &DeepseekYarnScaling) -> Result<f64> {
    let factor = params.yarn.factor;
    let denominator = mscale(factor, params.mscale_all_dim);
    if !denominator.is_finite() || denominator <= 0.0 {
        return Err(RopeError::NonPositive {
            name: "mscale(factor, mscale_all_dim)",
            value: denominator,
        });
    }
    Ok(mscale(factor, params.mscale) / denominator * params.yarn.attn_factor)
}

/// Table over `[0, original_max_position · factor)`.
pub fn build(config: &RotaryConfig, params: &YarnScaling) -> FrequencyTable {
    table(config, params, magnitude(params))
}

pub fn build_deepseek(
    config: &RotaryConfig,
    params: &DeepseekYarnScaling,
) -> Result<FrequencyTable> {
    Ok(table(config, &params.yarn, deepseek_magnitude(params)?))
}
