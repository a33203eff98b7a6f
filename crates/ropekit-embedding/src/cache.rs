//! Memoized construction of rotary embeddings.
//!
//! A [`RopeCache`] is owned by whatever builds models and passed down to the
//! attention layers; there is no process-wide singleton. Entries are never
//! evicted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use candle_core::Device;
use tracing::{debug, info};

use ropekit_common::{ModelRopeConfig, Result, RopeDType, RopeSpec, RotaryConfig};

use crate::RotaryEmbedding;

/// Hashable identity of a resolved configuration.
///
/// Floats are keyed by their bit patterns and list-valued scaling parameters
/// are flattened with a length prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RopeCacheKey {
    head_size: usize,
    rotary_dim: usize,
    max_position: usize,
    base_bits: u64,
    is_neox_style: bool,
    dtype: RopeDType,
    scaling: Vec<u64>,
}

impl RopeCacheKey {
    pub fn new(config: &RotaryConfig) -> Self {
        Self {
            head_size: config.head_size,
            rotary_dim: config.rotary_dim,
            max_position: config.max_position_embeddings,
            base_bits: config.base.to_bits(),
            is_neox_style: config.is_neox_style,
            dtype: config.dtype,
            scaling: config.scaling.canonical_words(),
        }
    }
}

/// Embedding cache and dispatcher.
#[derive(Debug)]
pub struct RopeCache {
    device: Device,
    entries: RwLock<HashMap<RopeCacheKey, Arc<RotaryEmbedding>>>,
    builds: AtomicUsize,
}

impl RopeCache {
    /// Empty cache whose embeddings live on `device`.
    pub fn new(device: Device) -> Self {
        Self { device, entries: RwLock::new(HashMap::new()), builds: AtomicUsize::new(0) }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Resolve `spec` and return the matching embedding, building it on a miss.
    ///
    /// The table is built without holding the lock, so concurrent first
    /// requests for one key may each build; the first insert wins and every
    /// later call returns that instance.
    pub fn get_rope(&self, spec: &RopeSpec) -> Result<Arc<RotaryEmbedding>> {
        let config = spec.resolve()?;
        let key = RopeCacheKey::new(&config);

        {
            // Recover from poisoned lock - entries are only ever inserted whole
            let entries = match self.entries.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(embedding) = entries.get(&key) {
                debug!(
                    rope_type = %embedding.rope_type(),
                    rotary_dim = config.rotary_dim,
                    "rope cache hit"
                );
                return Ok(Arc::clone(embedding));
            }
        }

        let embedding = Arc::new(RotaryEmbedding::new(config, &self.device)?);
        self.builds.fetch_add(1, Ordering::Relaxed);
        info!(
            rope_type = %embedding.rope_type(),
            head_size = embedding.config().head_size,
            rotary_dim = embedding.config().rotary_dim,
            rows = embedding.table_len(),
            "built rotary embedding"
        );

        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(Arc::clone(entries.entry(key).or_insert(embedding)))
    }

    /// [`get_rope`](Self::get_rope) for the rotary settings of a model config.
    pub fn get_rope_for_model(
        &self,
        model: &ModelRopeConfig,
        is_neox_style: bool,
    ) -> Result<Arc<RotaryEmbedding>> {
        self.get_rope(&model.to_spec(is_neox_style)?)
    }

    /// Number of cached embeddings.
    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embeddings constructed so far, including ones lost to a concurrent insert.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

impl Default for RopeCache {
    fn default() -> Self {
        Self::new(Device::Cpu)
    }
}
