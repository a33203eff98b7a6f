//! Unscaled RoPE; the reference every other strategy reduces to.

use crate::FrequencyTable;
use crate::freq::inverse_frequencies;

/// Table over `t in [0, max_position)` with `angle = t · inv_freq`.
pub fn build(base: f64, rotary_dim: usize, max_position: usize) -> FrequencyTable {
    let inv_freq = inverse_frequencies(base, rotary_dim);
    FrequencyTable::from_angles(&inv_freq, (0..max_position).map(|t| t as f64), 1.0)
}
