//! Stateless frequency math shared by the scaling strategies.

use std::f64::consts::PI;

/// Amount added to `high` when a ramp would otherwise divide by zero.
pub const RAMP_EPSILON: f64 = 0.001;

/// `base^(i / rotary_dim)` for `i = 0, 2, 4, …`, i.e. the reciprocal of each
/// inverse frequency.
pub fn position_frequencies(base: f64, rotary_dim: usize) -> Vec<f64> {
    (0..rotary_dim).step_by(2).map(|i| base.powf(i as f64 / rotary_dim as f64)).collect()
}

/// `1 / base^(i / rotary_dim)` for `i = 0, 2, 4, …`; `rotary_dim / 2` entries.
///
/// ```
/// use ropekit_tables::freq::inverse_frequencies;
///
/// let inv = inverse_frequencies(10_000.0, 4);
/// assert_eq!(inv.len(), 2);
/// assert!((inv[0] - 1.0).abs() < 1e-12);
/// assert!((inv[1] - 0.01).abs() < 1e-12);
/// ```
pub fn inverse_frequencies(base: f64, rotary_dim: usize) -> Vec<f64> {
    position_frequencies(base, rotary_dim).into_iter().map(|p| 1.0 / p).collect()
}

/// Dimension index at which a frequency completes `num_rotations` full turns
/// over `max_position` positions.
pub fn correction_dim(num_rotations: f64, dim: usize, base: f64, max_position: usize) -> f64 {
    dim as f64 * (max_position as f64 / (num_rotations * 2.0 * PI)).ln() / (2.0 * base.ln())
}

/// Band of dimension indices over which YaRN blends interpolation and
/// extrapolation, clamped to `[0, dim - 1]`.
pub fn correction_range(
    low_rot: f64,
    high_rot: f64,
    dim: usize,
    base: f64,
    max_position: usize,
) -> (f64, f64) {
    let low = correction_dim(low_rot, dim, base, max_position).floor().max(0.0);
    let high =
        correction_dim(high_rot, dim, base, max_position).ceil().min(dim.saturating_sub(1) as f64);
    (low, high)
}

/// `clip((i - low) / (high - low), 0, 1)` for `i` in `0..dim`.
pub fn linear_ramp_mask(low: f64, high: f64, dim: usize) -> Vec<f64> {
    #[allow(clippy::float_cmp)]
    let high = if low == high { high + RAMP_EPSILON } else { high };
    (0..dim).map(|i| ((i as f64 - low) / (high - low)).clamp(0.0, 1.0)).collect()
}

/// YaRN attention magnitude correction.
///
/// ```
/// use ropekit_tables::freq::mscale;
///
/// assert_eq!(mscale(1.0, 1.0), 1.0);
/// assert!((mscale(std::f64::consts::E, 1.0) - 1.1).abs() < 1e-12);
/// ```
pub fn mscale(scale: f64, extra_mscale: f64) -> f64 {
    if scale <= 1.0 { 1.0 } else { 0.1 * extra_mscale * scale.ln() + 1.0 }
}

/// Default LongRoPE magnitude correction for extending `original` to
/// `max_position` positions.
pub fn longrope_mscale(max_position: usize, original: usize) -> f64 {
    let scale = max_position as f64 / original as f64;
    if scale <= 1.0 { 1.0 } else { (1.0 + scale.ln() / (original as f64).ln()).sqrt() }
}

/// Number of rows in a table over `[0, max_position · factor)`.
pub fn extended_rows(max_position: usize, factor: f64) -> usize {
    (max_position as f64 * factor).ceil() as usize
}
