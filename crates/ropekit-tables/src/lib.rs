//! Shared rotary position embedding (RoPE) table generation.
//!
//! This crate owns only table generation for RoPE sine/cosine caches so the
//! embedding layer can keep rotation focused on tensor-shape and execution
//! concerns. Every scaling strategy reduces to [`FrequencyTable::from_angles`]
//! over its own inverse frequencies and position range.

pub mod freq;
pub mod scaling;

use ropekit_common::{Result, RotaryConfig};

pub use scaling::build_table;

/// How the rows of a table are grouped.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TableLayout {
    /// One contiguous block starting at position zero.
    #[default]
    Single,
    /// Linear scaling: one block per factor, starting at the given rows.
    Blocks { offsets: Vec<usize> },
    /// LongRoPE: `short_rows` rows of the short table followed by the long table.
    DualRange { short_rows: usize, short_mscale: f64, long_mscale: f64 },
}

/// Generated RoPE lookup tables.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyTable {
    /// Half of the rotary dimension (`rotary_dim / 2`).
    pub half_dim: usize,
    /// Number of positions (rows).
    pub rows: usize,
    /// Flattened cosine table in row-major `[rows, half_dim]`.
    pub cos: Vec<f32>,
    /// Flattened sine table in row-major `[rows, half_dim]`.
    pub sin: Vec<f32>,
    pub layout: TableLayout,
}

impl FrequencyTable {
    /// Build `cos(t·f)·scale` and `sin(t·f)·scale` for every position `t`
    /// and inverse frequency `f`.
    ///
    /// Angles are formed in `f64` and stored as `f32`.
    pub fn from_angles(
        inv_freq: &[f64],
        positions: impl IntoIterator<Item = f64>,
        scale: f64,
    ) -> Self {
        let half_dim = inv_freq.len();
        let mut cos = Vec::new();
        let mut sin = Vec::new();
        let mut rows = 0;

        for t in positions {
            for &freq in inv_freq {
                let (s, c) = (t * freq).sin_cos();
                sin.push((s * scale) as f32);
                cos.push((c * scale) as f32);
            }
            rows += 1;
        }

        Self { half_dim, rows, cos, sin, layout: TableLayout::Single }
    }

    /// Stack tables row-wise. All parts must share `half_dim`.
    pub fn concat(parts: Vec<FrequencyTable>) -> Self {
        let half_dim = parts.first().map_or(0, |p| p.half_dim);
        let rows = parts.iter().map(|p| p.rows).sum();
        let mut cos = Vec::with_capacity(rows * half_dim);
        let mut sin = Vec::with_capacity(rows * half_dim);
        for part in parts {
            debug_assert_eq!(part.half_dim, half_dim);
            cos.extend(part.cos);
            sin.extend(part.sin);
        }
        Self { half_dim, rows, cos, sin, layout: TableLayout::Single }
    }

    pub fn with_layout(mut self, layout: TableLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// `(cos, sin)` slices for one position.
    pub fn row(&self, index: usize) -> Option<(&[f32], &[f32])> {
        if index >= self.rows {
            return None;
        }
        let span = index * self.half_dim..(index + 1) * self.half_dim;
        Some((&self.cos[span.clone()], &self.sin[span]))
    }
}

/// Build the unscaled `[max_seq_len, dim / 2]` table.
pub fn build_tables(dim: usize, max_seq_len: usize, base: f64) -> Result<FrequencyTable> {
    build_table(&RotaryConfig::new(dim, dim, max_seq_len, base))
}
