//! Constructed rotary embedding: validated configuration plus its tables on a
//! device.

use candle_core::{DType, Device, Tensor};

use ropekit_common::{Result, RopeError, RopeType, RotaryConfig};
use ropekit_tables::{FrequencyTable, TableLayout, build_table};

use crate::rotation::{RotationStyle, apply_rotary, expand_half};

/// Rotary embedding instance. Immutable after construction.
#[derive(Debug)]
pub struct RotaryEmbedding {
    config: RotaryConfig,
    layout: TableLayout,
    rows: usize,
    cos: Tensor,
    sin: Tensor,
    device: Device,
}

impl RotaryEmbedding {
    /// Validate `config`, build its table and upload it to `device`.
    pub fn new(config: RotaryConfig, device: &Device) -> Result<Self> {
        let FrequencyTable { half_dim, rows, cos, sin, layout } = build_table(&config)?;
        let cos = Tensor::from_vec(cos, (rows, half_dim), device)?;
        let sin = Tensor::from_vec(sin, (rows, half_dim), device)?;
        Ok(Self { config, layout, rows, cos, sin, device: device.clone() })
    }

    pub fn config(&self) -> &RotaryConfig {
        &self.config
    }

    pub fn rope_type(&self) -> RopeType {
        self.config.scaling.rope_type()
    }

    pub fn style(&self) -> RotationStyle {
        RotationStyle::from_neox(self.config.is_neox_style)
    }

    /// Number of rows in the cosine/sine table.
    pub fn table_len(&self) -> usize {
        self.rows
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    /// `[table_len, rotary_dim / 2]` cosine table.
    pub fn cos_table(&self) -> &Tensor {
        &self.cos
    }

    /// `[table_len, rotary_dim / 2]` sine table.
    pub fn sin_table(&self) -> &Tensor {
        &self.sin
    }

    /// First row of each linear-scaling block, in factor order.
    pub fn scaling_factor_offsets(&self) -> Option<&[usize]> {
        match &self.layout {
            TableLayout::Blocks { offsets } => Some(offsets),
            _ => None,
        }
    }

    pub fn short_mscale(&self) -> Option<f64> {
        match self.layout {
            TableLayout::DualRange { short_mscale, .. } => Some(short_mscale),
            _ => None,
        }
    }

    pub fn long_mscale(&self) -> Option<f64> {
        match self.layout {
            TableLayout::DualRange { long_mscale, .. } => Some(long_mscale),
            _ => None,
        }
    }

    /// Gather `(cos, sin)` rows for `positions`, each `[n, rotary_dim / 2]`
    /// in `f32`, where `n` is the element count of `positions`.
    ///
    /// `offsets`, when given, holds either one value per position or one per
    /// sequence (last axis of `positions`). LongRoPE reads the long block for
    /// every position of a sequence that has any position past the original
    /// context.
    pub fn cos_sin(
        &self,
        positions: &Tensor,
        offsets: Option<&Tensor>,
    ) -> Result<(Tensor, Tensor)> {
        let indices = self.table_indices(positions, offsets)?;
        let ids = Tensor::from_vec(indices, positions.elem_count(), &self.device)?;
        Ok((self.cos.index_select(&ids, 0)?, self.sin.index_select(&ids, 0)?))
    }

    /// Rotate `query` and `key`, each `[..., heads, head_dim]` where the
    /// leading axes hold one entry per position. Head counts may differ.
    pub fn apply(
        &self,
        positions: &Tensor,
        query: &Tensor,
        key: &Tensor,
        offsets: Option<&Tensor>,
    ) -> Result<(Tensor, Tensor)> {
        let (cos, sin) = self.cos_sin(positions, offsets)?;
        let style = self.style();
        let cos = expand_half(&cos, style)?;
        let sin = expand_half(&sin, style)?;
        let out_dtype = self.config.dtype.to_candle();
        let n = positions.elem_count();

        let query = self.rotate(query, n, &cos, &sin, out_dtype)?;
        let key = self.rotate(key, n, &cos, &sin, out_dtype)?;
        Ok((query, key))
    }

    fn rotate(
        &self,
        x: &Tensor,
        n: usize,
        cos: &Tensor,
        sin: &Tensor,
        out_dtype: DType,
    ) -> Result<Tensor> {
        let dims = x.dims();
        let (heads, head_dim) = match dims {
            [.., heads, head_dim] => (*heads, *head_dim),
            _ => {
                return Err(RopeError::ShapeMismatch(format!(
                    "expected [..., heads, head_dim], got {dims:?}"
                )));
            }
        };
        if head_dim != self.config.head_size {
            return Err(RopeError::ShapeMismatch(format!(
                "head_dim {head_dim} does not match head_size {}",
                self.config.head_size
            )));
        }
        let leading: usize = dims[..dims.len() - 2].iter().product();
        if leading != n {
            return Err(RopeError::ShapeMismatch(format!(
                "{leading} token vectors in {dims:?} but {n} positions"
            )));
        }

        let flat = x.reshape((n, heads, head_dim))?;
        Ok(apply_rotary(&flat, cos, sin, self.style(), out_dtype)?.reshape(dims)?)
    }

    fn table_indices(&self, positions: &Tensor, offsets: Option<&Tensor>) -> Result<Vec<u32>> {
        let positions_flat = to_i64(positions, "positions")?;
        let n = positions_flat.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        let seq_len = positions.dims().last().copied().unwrap_or(1);
        let seq_len = if seq_len == 0 { 1 } else { seq_len };

        let offsets = match offsets {
            None => vec![0; n],
            Some(offsets) => {
                let values = to_i64(offsets, "offsets")?;
                if values.len() == n {
                    values
                } else if values.len() * seq_len == n {
                    values.iter().flat_map(|&o| std::iter::repeat_n(o, seq_len)).collect()
                } else {
                    return Err(RopeError::ShapeMismatch(format!(
                        "{} offsets for {n} positions in sequences of {seq_len}",
                        values.len()
                    )));
                }
            }
        };

        let short_rows = match self.layout {
            TableLayout::DualRange { short_rows, .. } => Some(short_rows as i64),
            _ => None,
        };

        let mut indices = Vec::with_capacity(n);
        for (sequence, sequence_offsets) in
            positions_flat.chunks(seq_len).zip(offsets.chunks(seq_len))
        {
            let shift = match short_rows {
                Some(k) if sequence.iter().any(|&p| p > k) => k,
                _ => 0,
            };
            for (&p, &offset) in sequence.iter().zip(sequence_offsets) {
                let index = p + shift + offset;
                if index < 0 || index >= self.rows as i64 {
                    return Err(RopeError::PositionOutOfRange {
                        position: index,
                        table_len: self.rows,
                    });
                }
                indices.push(index as u32);
            }
        }
        Ok(indices)
    }
}

/// Flatten an integer index tensor. Float tensors are rejected rather than truncated.
fn to_i64(t: &Tensor, name: &str) -> Result<Vec<i64>> {
    if !t.dtype().is_int() {
        return Err(RopeError::ShapeMismatch(format!(
            "{name} must be an integer tensor, got {:?}",
            t.dtype()
        )));
    }
    Ok(t.flatten_all()?.to_dtype(DType::I64)?.to_vec1::<i64>()?)
}
