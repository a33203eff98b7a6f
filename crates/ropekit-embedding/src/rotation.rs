//! Rotation kernels for the split-half (neox) and interleaved (gptj) pairings.

use candle_core::{D, DType, Tensor};

use ropekit_common::Result;

/// How the components of a head vector are paired for rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationStyle {
    /// Pair `x[i]` with `x[i + d/2]`.
    Neox,
    /// Pair `x[2i]` with `x[2i + 1]`.
    Gptj,
}

impl RotationStyle {
    pub fn from_neox(is_neox_style: bool) -> Self {
        if is_neox_style { Self::Neox } else { Self::Gptj }
    }
}

/// Rotate every pair by 90°: `(x1, x2) -> (-x2, x1)`.
pub fn rotate_half(x: &Tensor, style: RotationStyle) -> Result<Tensor> {
    let last = x.dim(D::Minus1)?;
    let half = last / 2;
    match style {
        RotationStyle::Neox => {
            let x1 = x.narrow(D::Minus1, 0, half)?;
            let x2 = x.narrow(D::Minus1, half, half)?;
            Ok(Tensor::cat(&[&x2.neg()?, &x1], D::Minus1)?)
        }
        RotationStyle::Gptj => {
            let dims = x.dims().to_vec();
            let mut paired = dims[..dims.len() - 1].to_vec();
            paired.extend([half, 2]);
            let x = x.contiguous()?.reshape(paired)?;
            let x1 = x.narrow(D::Minus1, 0, 1)?;
            let x2 = x.narrow(D::Minus1, 1, 1)?;
            Ok(Tensor::cat(&[&x2.neg()?, &x1], D::Minus1)?.reshape(dims)?)
        }
    }
}

/// Widen a `[n, d/2]` table to `[n, d]` so that each entry lines up with both
/// components of its pair.
pub fn expand_half(table: &Tensor, style: RotationStyle) -> Result<Tensor> {
    let (rows, half) = table.dims2()?;
    match style {
        RotationStyle::Neox => Ok(Tensor::cat(&[table, table], 1)?),
        RotationStyle::Gptj => Ok(Tensor::stack(&[table, table], 2)?.reshape((rows, half * 2))?),
    }
}

/// `x·cos + rotate(x)·sin` over the leading `rotary_dim` components of each
/// head; the rest passes through.
///
/// `x` is `[n, heads, head_dim]`; `cos` and `sin` are the expanded
/// `[n, rotary_dim]` tables. Arithmetic runs in `f32` and the result is cast
/// to `out_dtype`.
pub fn apply_rotary(
    x: &Tensor,
    cos: &Tensor,
    sin: &Tensor,
    style: RotationStyle,
    out_dtype: DType,
) -> Result<Tensor> {
    let (_, _, head_dim) = x.dims3()?;
    let rotary_dim = cos.dim(D::Minus1)?;
    let x = x.to_dtype(DType::F32)?;

    let rot = x.narrow(2, 0, rotary_dim)?;
    let cos = cos.unsqueeze(1)?;
    let sin = sin.unsqueeze(1)?;
    let rotated = (rot.broadcast_mul(&cos)? + rotate_half(&rot, style)?.broadcast_mul(&sin)?)?;

    let out = if rotary_dim < head_dim {
        let pass = x.narrow(2, rotary_dim, head_dim - rotary_dim)?;
        Tensor::cat(&[&rotated, &pass], 2)?
    } else {
        rotated
    };
    Ok(out.to_dtype(out_dtype)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn row(values: &[f32]) -> Tensor {
        Tensor::new(values, &Device::Cpu).unwrap().reshape((1, 1, values.len())).unwrap()
    }

    fn flat(t: &Tensor) -> Vec<f32> {
        t.flatten_all().unwrap().to_vec1::<f32>().unwrap()
    }

    #[test]
    fn neox_rotates_halves() {
        let x = row(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(flat(&rotate_half(&x, RotationStyle::Neox).unwrap()), [-3.0, -4.0, 1.0, 2.0]);
    }

    #[test]
    fn gptj_rotates_adjacent_pairs() {
        let x = row(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(flat(&rotate_half(&x, RotationStyle::Gptj).unwrap()), [-2.0, 1.0, -4.0, 3.0]);
    }

    #[test]
    fn rotating_twice_negates_exactly() {
        let x = row(&[0.1, -2.5, 3.75, 1e-3, 7.0, -0.0, 12.5, -9.25]);
        for style in [RotationStyle::Neox, RotationStyle::Gptj] {
            let twice = rotate_half(&rotate_half(&x, style).unwrap(), style).unwrap();
            let expected: Vec<f32> = flat(&x).iter().map(|v| -v).collect();
            assert_eq!(flat(&twice), expected, "{style:?}");
        }
    }

    #[test]
    fn expand_half_layouts() {
        let table = Tensor::new(&[[1f32, 2.0]], &Device::Cpu).unwrap();
        assert_eq!(flat(&expand_half(&table, RotationStyle::Neox).unwrap()), [1.0, 2.0, 1.0, 2.0]);
        assert_eq!(flat(&expand_half(&table, RotationStyle::Gptj).unwrap()), [1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn quarter_turn_on_first_pair() {
        // cos = 0, sin = 1 maps (x1, x2) to (-x2, x1).
        let x = row(&[1.0, 0.0, 5.0]);
        let cos = Tensor::new(&[[0f32, 0.0]], &Device::Cpu).unwrap();
        let sin = Tensor::new(&[[1f32, 1.0]], &Device::Cpu).unwrap();
        let out = apply_rotary(&x, &cos, &sin, RotationStyle::Gptj, DType::F32).unwrap();
        assert_eq!(flat(&out), [0.0, 1.0, 5.0]);
    }

    #[test]
    fn output_is_cast_to_requested_dtype() {
        let x = row(&[1.0, 2.0]);
        let cos = Tensor::new(&[[1f32, 1.0]], &Device::Cpu).unwrap();
        let sin = Tensor::new(&[[0f32, 0.0]], &Device::Cpu).unwrap();
        let out = apply_rotary(&x, &cos, &sin, RotationStyle::Neox, DType::BF16).unwrap();
        assert_eq!(out.dtype(), DType::BF16);
    }
}
