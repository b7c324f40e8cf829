//! Offline embedding provider.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::{EmbeddingProvider, ProviderError};

pub const DEFAULT_LOCAL_DIMENSION: usize = 384;

/// Hashed bag-of-words embedding.
///
/// Each lower-cased word is hashed (FNV-1a) into three buckets weighted by
/// its term frequency, then the vector is L2-normalised. Needs no model
/// files or network, and texts sharing vocabulary land close together,
/// which is enough for offline use and deterministic tests.
#[derive(Debug, Clone)]
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    fn name(&self) -> &'static str {
        "local-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.is_empty() {
            return Err(ProviderError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
            .collect();

        if words.is_empty() {
            return Ok(vector);
        }

        let mut freq: HashMap<&str, f32> = HashMap::new();
        for word in &words {
            *freq.entry(word).or_insert(0.0) += 1.0;
        }

        let total = words.len() as f32;
        for (word, count) in &freq {
            let tf = count / total;
            let bytes = word.as_bytes();
            vector[fnv1a(bytes, None) as usize % self.dimension] += tf;
            vector[fnv1a(bytes, Some(1)) as usize % self.dimension] += tf * 0.7;
            vector[fnv1a(bytes, Some(2)) as usize % self.dimension] += tf * 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }
}

/// FNV-1a over `data`, optionally salted with one trailing byte.
fn fnv1a(data: &[u8], salt: Option<u8>) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &byte in data.iter().chain(salt.as_ref()) {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}
