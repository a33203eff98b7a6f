#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Strategy {
    Default,
    Linear(Vec<f32>),
    Dynamic(f32),
    Yarn { factor: f32, original: u8, beta_fast: f32, beta_slow: f32 },
    DeepseekYarn { factor: f32, original: u8, mscale: f32, mscale_all_dim: f32 },
    Llama3 { factor: f32, low: f32, high: f32, original: u8 },
    LongRope { original: u8, short: f32, long: f32 },
}

#[derive(Arbitrary, Debug)]
struct Input {
    dim: u8,
    seq_len: u8,
    base: f32,
    strategy: Strategy,
}

fuzz_target!(|input: Input| {
    use ropekit_common::{RopeScalingConfig, RopeType, RotaryConfig};
    use ropekit_tables::build_table;

    let dim = input.dim as usize;
    let seq_len = input.seq_len as usize;
    let half = dim / 2;

    let raw = match input.strategy {
        Strategy::Default => RopeScalingConfig::new(RopeType::Default),
        Strategy::Linear(factors) => {
            let factors: Vec<f64> =
                factors.into_iter().take(4).map(|f| f64::from(f.clamp(-8.0, 8.0))).collect();
            RopeScalingConfig::new(RopeType::Linear).with_factor(factors)
        }
        Strategy::Dynamic(factor) => RopeScalingConfig::new(RopeType::Dynamic)
            .with_factor(f64::from(factor.clamp(-8.0, 8.0))),
        Strategy::Yarn { factor, original, beta_fast, beta_slow } => {
            RopeScalingConfig::new(RopeType::Yarn)
                .with_factor(f64::from(factor.clamp(-8.0, 8.0)))
                .with_original_max_position(original as usize)
                .with_betas(f64::from(beta_fast), f64::from(beta_slow))
        }
        Strategy::DeepseekYarn { factor, original, mscale, mscale_all_dim } => {
            RopeScalingConfig::new(RopeType::DeepseekYarn)
                .with_factor(f64::from(factor.clamp(-8.0, 8.0)))
                .with_original_max_position(original as usize)
                .with_mscales(f64::from(mscale), f64::from(mscale_all_dim))
        }
        Strategy::Llama3 { factor, low, high, original } => RopeScalingConfig::new(RopeType::Llama3)
            .with_factor(f64::from(factor))
            .with_freq_factors(f64::from(low), f64::from(high))
            .with_original_max_position(original as usize),
        Strategy::LongRope { original, short, long } => RopeScalingConfig::new(RopeType::Longrope)
            .with_original_max_position(original as usize)
            .with_range_factors(vec![f64::from(short); half], vec![f64::from(long); half]),
    };

    let Ok(scaling) = raw.validate() else { return };
    let config = RotaryConfig::new(dim, dim, seq_len, f64::from(input.base)).with_scaling(scaling);

    // Errors are expected for invalid inputs; just ensure no panic occurred.
    let Ok(table) = build_table(&config) else { return };

    // Shape invariant: both vecs must have exactly rows * half_dim entries.
    assert_eq!(table.half_dim, half);
    assert_eq!(table.sin.len(), table.rows * half);
    assert_eq!(table.cos.len(), table.rows * half);
});
