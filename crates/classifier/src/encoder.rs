//! Text encoders and the memoizing wrapper around them.

use crate::cache::{CacheStats, EmbeddingCache};
use std::sync::Arc;
use urbanroute_core::{Embedding, ModelError};

/// Turns raw text into a fixed-dimension vector.
///
/// Implementations are deterministic and stateless, so a loaded encoder can
/// be shared between sessions.
pub trait Encoder: Send + Sync {
    /// Short identifier of the encoder family (e.g. "hashing").
    fn kind(&self) -> &'static str;

    /// Length of every vector this encoder produces.
    fn dimension(&self) -> usize;

    fn encode(&self, text: &str) -> Result<Vec<f32>, ModelError>;
}

/// An [`Encoder`] fronted by an [`EmbeddingCache`].
///
/// Repeated text is served from the cache without re-running the encoder.
pub struct CachedEncoder {
    encoder: Arc<dyn Encoder>,
    cache: EmbeddingCache,
}

impl CachedEncoder {
    pub fn new(encoder: Arc<dyn Encoder>, capacity: usize) -> Self {
        Self {
            encoder,
            cache: EmbeddingCache::new(capacity),
        }
    }

    pub fn encode(&mut self, text: &str) -> Result<Embedding, ModelError> {
        if let Some(hit) = self.cache.get(text) {
            tracing::trace!(chars = text.chars().count(), "Embedding cache hit");
            return Ok(hit);
        }

        let values = self.encoder.encode(text)?;
        if values.len() != self.encoder.dimension() {
            return Err(ModelError::Inference(format!(
                "{} encoder produced {} values, expected {}",
                self.encoder.kind(),
                values.len(),
                self.encoder.dimension()
            )));
        }

        let embedding = Embedding::new(values);
        if let Some(evicted) = self.cache.insert(text.to_string(), embedding.clone()) {
            tracing::trace!(evicted_chars = evicted.chars().count(), "Embedding cache eviction");
        }
        Ok(embedding)
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
