//! Feature-hashing embeddings.
//!
//! Text is split into alphanumeric words (so `snake_case` identifiers
//! contribute each part), and every word is hashed into one of `dims` buckets
//! with a ±1 sign and the resulting counts are L2-normalized. Texts that share
//! tokens land close together under cosine similarity. There is no model
//! to download and results are stable across runs and platforms, which
//! makes this provider suitable for offline use and tests.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::Result;

const DEFAULT_DIMS: usize = 256;

pub struct HashProvider {
    model_name: String,
    dims: usize,
}

impl HashProvider {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            model_name: config
                .model
                .clone()
                .unwrap_or_else(|| "feature-hash".to_string()),
            dims: config.dims.unwrap_or(DEFAULT_DIMS).max(1),
        }
    }

    pub fn with_dims(dims: usize) -> Self {
        Self {
            model_name: "feature-hash".to_string(),
            dims: dims.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut word = [0u8; 8];
            word.copy_from_slice(&digest[..8]);
            let h = u64::from_le_bytes(word);
            let bucket = (h % self.dims as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn test_deterministic_and_normalized() {
        let p = HashProvider::with_dims(128);
        let a = p.embed_one("fn parse_config(path: &Path)");
        let b = p.embed_one("fn parse_config(path: &Path)");
        assert_eq!(p.embed_one("parse_config"), p.embed_one("parse config"));
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_tokens_score_higher() {
        let p = HashProvider::with_dims(256);
        let query = p.embed_one("database connection pool");
        let related = p.embed_one("create a connection pool for the database");
        let unrelated = p.embed_one("render the sidebar widget");
        assert!(
            cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated),
            "related text should be closer"
        );
    }

    #[test]
    fn test_case_insensitive() {
        let p = HashProvider::with_dims(64);
        assert_eq!(p.embed_one("Config"), p.embed_one("config"));
    }

    #[test]
    fn test_no_tokens_is_zero_vector() {
        let p = HashProvider::with_dims(16);
        assert!(p.embed_one("  ;; ").iter().all(|x| *x == 0.0));
    }
}
