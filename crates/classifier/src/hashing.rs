//! Feature-hashing encoder.
//!
//! Hashes lowercased alphanumeric tokens into a fixed number of buckets with
//! FNV-1a and weights them by term frequency. No model files, no network:
//! always available.

use crate::encoder::Encoder;
use std::collections::HashMap;
use urbanroute_core::ModelError;

pub struct HashingEncoder {
    dimension: usize,
}

impl HashingEncoder {
    pub fn new(dimension: usize) -> Result<Self, ModelError> {
        if dimension == 0 {
            return Err(ModelError::InvalidCheckpoint(
                "hashing encoder dimension must be at least 1".into(),
            ));
        }
        Ok(Self { dimension })
    }

    /// FNV-1a over the token's UTF-8 bytes.
    fn bucket(&self, term: &str) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % self.dimension as u64) as usize
    }

    fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

impl Encoder for HashingEncoder {
    fn kind(&self) -> &'static str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let mut tf: HashMap<String, f32> = HashMap::new();
        for token in Self::tokenize(text) {
            *tf.entry(token).or_default() += 1.0;
        }

        let mut vec = vec![0.0f32; self.dimension];
        for (term, count) in &tf {
            vec[self.bucket(term)] += count;
        }

        // L2 normalize; an empty input stays the zero vector.
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }

        Ok(vec)
    }
}
