//! Rotary position embeddings on candle tensors.
//!
//! [`RopeCache::get_rope`] resolves a [`RopeSpec`], builds (or reuses) the
//! matching [`RotaryEmbedding`], and the embedding rotates query/key tensors
//! through [`rotation`].
//!
//! ```
//! use candle_core::{DType, Device, Tensor};
//! use ropekit_embedding::{RopeCache, RopeSpec};
//!
//! let cache = RopeCache::new(Device::Cpu);
//! let rope = cache.get_rope(&RopeSpec::new(64, 64, 2048, 10_000.0))?;
//!
//! let positions = Tensor::new(&[0u32], &Device::Cpu)?;
//! let query = Tensor::ones((1, 1, 1, 64), DType::F32, &Device::Cpu)?;
//! let (q, _k) = rope.apply(&positions, &query, &query, None)?;
//! assert_eq!(q.dims(), &[1, 1, 1, 64]);
//! # Ok::<(), ropekit_embedding::RopeError>(())
//! ```

pub mod cache;
pub mod embedding;
pub mod rotation;

pub use cache::{RopeCache, RopeCacheKey};
pub use embedding::RotaryEmbedding;
pub use rotation::RotationStyle;

pub use ropekit_common::{
    ModelRopeConfig, Result, RopeDType, RopeError, RopeScalingConfig, RopeSpec, RopeType,
    RotaryConfig,
};
