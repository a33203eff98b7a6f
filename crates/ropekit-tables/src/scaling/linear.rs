//! Linear position interpolation.

use ropekit_common::{LinearScaling, RotaryConfig};

use crate::freq::{extended_rows, inverse_frequencies};
use crate::{FrequencyTable, TableLayout};

/// One sub-table per factor `f` over `t / f` for `t in [0, max_position · f)`,
/// concatenated in factor order. The layout records each block's first row.
pub fn build(config: &RotaryConfig, params: &LinearScaling) -> FrequencyTable {
    let inv_freq = inverse_frequencies(config.base, config.rotary_dim);
    let mut offsets = Vec::with_capacity(params.factors.len());
    let mut parts = Vec::with_capacity(params.factors.len());
    let mut next_offset = 0;

    for &factor in &params.factors {
        let rows = extended_rows(config.max_position_embeddings, factor);
        offsets.push(next_offset);
        next_offset += rows;
        let positions = (0..rows).map(|t| t as f64 / factor);
        parts.push(FrequencyTable::from_angles(&inv_freq, positions, 1.0));
    }

    FrequencyTable::concat(parts).with_layout(TableLayout::Blocks { offsets })
}
