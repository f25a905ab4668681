//! Categorization and embedding model seams (spec.md §4.5 step 6). Real
//! providers are external and opaque to the core (spec.md §6 "Embedding/
//! categorization model provider key"); the fallback implementations here
//! are deterministic local stand-ins so ingestion never blocks on an
//! unconfigured provider, mirroring `content-service`'s pattern of a trait
//! seam with a safe local default.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::models::CATEGORY_VOCABULARY;

#[async_trait]
pub trait Categorizer: Send + Sync {
    async fn categorize(&self, text: &str) -> Vec<String>;
}

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

/// Deterministic keyword categorizer: scans `text` for vocabulary terms
/// case-insensitively, returns up to two matches, else `["Fun"]` (spec.md
/// §4.5 step 6 "default `["Fun"]` on failure").
pub struct KeywordCategorizer;

#[async_trait]
impl Categorizer for KeywordCategorizer {
    async fn categorize(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let matches: Vec<String> = CATEGORY_VOCABULARY
            .iter()
            .filter(|cat| lower.contains(&cat.to_lowercase()))
            .take(2)
            .map(|s| s.to_string())
            .collect();

        if matches.is_empty() {
            vec!["Fun".to_string()]
        } else {
            matches
        }
    }
}

const EMBEDDING_DIM: usize = 32;

/// Deterministic local embedding: hashes `text` into a fixed-size unit
/// vector. Not semantically meaningful, but stable, cheap, and never
/// `None` — a safe default when no real embedding provider is configured.
pub struct HashEmbeddingModel;

#[async_trait]
impl EmbeddingModel for HashEmbeddingModel {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            return None;
        }

        let mut vector = vec![0f32; EMBEDDING_DIM];
        let mut seed = Sha256::digest(text.as_bytes()).to_vec();
        while seed.len() < EMBEDDING_DIM {
            seed.extend(Sha256::digest(&seed).to_vec());
        }
        for (i, slot) in vector.iter_mut().enumerate() {
            *slot = (seed[i] as f32 / 255.0) * 2.0 - 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Some(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keyword_categorizer_matches_vocabulary() {
        let cats = KeywordCategorizer.categorize("A deep dive into AI and Science").await;
        assert!(cats.contains(&"AI".to_string()));
    }

    #[tokio::test]
    async fn keyword_categorizer_falls_back_to_fun() {
        let cats = KeywordCategorizer.categorize("asdkjhaslkdjh").await;
        assert_eq!(cats, vec!["Fun".to_string()]);
    }

    #[tokio::test]
    async fn hash_embedding_is_deterministic_and_unit_norm() {
        let a = HashEmbeddingModel.embed("hello world").await.unwrap();
        let b = HashEmbeddingModel.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn hash_embedding_none_for_empty_text() {
        assert!(HashEmbeddingModel.embed("").await.is_none());
    }
}
