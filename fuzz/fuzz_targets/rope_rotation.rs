#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct RopeInput {
    /// Head dimension (will be clamped to even value 2..=64).
    dim: u8,
    /// Sequence position; may exceed the table.
    position: u16,
    /// RoPE base theta.
    base: f32,
    neox: bool,
    /// Raw vector data (interpreted as f32).
    data: Vec<u8>,
}

fuzz_target!(|input: RopeInput| {
    use candle_core::{Device, Tensor};
    use ropekit_common::RopeError;
    use ropekit_embedding::{RopeCache, RopeSpec};

    let dim = (((input.dim as usize) % 32) + 1) * 2;
    let base = f64::from(input.base.abs());
    if !base.is_finite() || base <= 0.0 {
        return;
    }

    let cache = RopeCache::default();
    let spec = RopeSpec::new(dim, dim, 256, base).with_neox_style(input.neox);
    let Ok(rope) = cache.get_rope(&spec) else { return };

    let raw: Vec<f32> = input
        .data
        .chunks_exact(4)
        .take(dim)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    // Skip vectors with non-finite components (norm is meaningless).
    if raw.len() < dim || raw.iter().any(|x| !x.is_finite() || x.abs() > 1e6) {
        return;
    }

    let Ok(x) = Tensor::from_vec(raw.clone(), (1, 1, dim), &Device::Cpu) else { return };
    let Ok(positions) = Tensor::new(&[u32::from(input.position)], &Device::Cpu) else { return };

    match rope.apply(&positions, &x, &x, None) {
        Ok((q, _)) => {
            assert!(input.position < 256);
            let out: Vec<f32> = q.flatten_all().and_then(|t| t.to_vec1()).unwrap_or_default();
            assert_eq!(out.len(), dim);

            // No NaN or Inf in output, and the norm is preserved.
            let before: f32 = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
            let after: f32 = out.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!(after.is_finite());
            assert!((before - after).abs() <= 1e-3 * before.max(1.0), "{before} vs {after}");
        }
        Err(RopeError::PositionOutOfRange { .. }) => assert!(input.position >= 256),
        Err(e) => panic!("unexpected rotation error: {e}"),
    }
});
