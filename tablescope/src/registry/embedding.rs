//! Embedding service: fixed-dimension unit vectors from text.
//!
//! Two implementations sit behind the [`Embedder`] trait: a deterministic
//! hash-based embedder (dimension 128) that needs no model, and whatever
//! learned model the caller injects through a factory. Initialization is
//! single-flight: the first caller resolves the embedder (with a 30-second
//! budget for learned models), later callers await the cached instance.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::Result;

/// Dimension of the hash-based fallback embedder.
pub const HASH_EMBEDDING_DIM: usize = 128;
/// Budget for learned-model initialization before falling back to hashing.
const INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Capability: embed text into an L2-normalized fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Output vector length.
    fn dimension(&self) -> usize;

    /// Implementation name, recorded in registry metadata.
    fn name(&self) -> &str;

    /// Embeds one text. Deterministic for identical input; the output is
    /// unit length or all-zero.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds a batch; the default maps [`Embedder::embed`] over the slice.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Hash-based embedder: token counts bucketed by SHA-256, L2-normalized.
#[derive(Debug, Default, Clone)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn new() -> Self {
        Self
    }

    /// Maximal runs of ASCII letters and digits, lowercased.
    fn tokenize(text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        for c in text.chars() {
            if c.is_ascii_alphanumeric() {
                current.extend(c.to_lowercase());
            } else if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }
        tokens
    }

    fn bucket(token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % HASH_EMBEDDING_DIM as u64) as usize
    }

    fn embed_sync(text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; HASH_EMBEDDING_DIM];
        for token in Self::tokenize(text) {
            vector[Self::bucket(&token)] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        HASH_EMBEDDING_DIM
    }

    fn name(&self) -> &str {
        "hash-128"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::embed_sync(text))
    }
}

/// Factory producing a learned embedder; run at most once.
pub type EmbedderFactory =
    Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn Embedder>>> + Send + Sync>;

/// Explicit handle to the lazily-initialized embedder.
///
/// Constructed once and passed into whatever needs embeddings; the inner
/// `OnceCell` guarantees only the first caller runs the factory while the
/// rest await the same cached instance.
pub struct EmbeddingService {
    factory: Option<EmbedderFactory>,
    cell: OnceCell<Arc<dyn Embedder>>,
}

impl Default for EmbeddingService {
    fn default() -> Self {
        Self::hash_only()
    }
}

impl EmbeddingService {
    /// Service that always resolves to the hash embedder.
    pub fn hash_only() -> Self {
        Self {
            factory: None,
            cell: OnceCell::new(),
        }
    }

    /// Service that tries a learned embedder first, falling back to hashing
    /// if the factory fails or exceeds the 30-second budget.
    pub fn with_factory(factory: EmbedderFactory) -> Self {
        Self {
            factory: Some(factory),
            cell: OnceCell::new(),
        }
    }

    /// Resolves the embedder, initializing on first call.
    pub async fn get(&self) -> Arc<dyn Embedder> {
        self.cell
            .get_or_init(|| async {
                match &self.factory {
                    None => Arc::new(HashEmbedder::new()) as Arc<dyn Embedder>,
                    Some(factory) => {
                        match tokio::time::timeout(INIT_TIMEOUT, factory()).await {
                            Ok(Ok(embedder)) => {
                                info!(
                                    name = embedder.name(),
                                    dim = embedder.dimension(),
                                    "learned embedder initialized"
                                );
                                embedder
                            }
                            Ok(Err(e)) => {
                                warn!(error = %e, "learned embedder failed, using hash fallback");
                                Arc::new(HashEmbedder::new())
                            }
                            Err(_) => {
                                warn!("learned embedder init timed out, using hash fallback");
                                Arc::new(HashEmbedder::new())
                            }
                        }
                    }
                }
            })
            .await
            .clone()
    }
}

/// Cosine distance (`1 - cos`) between two unit vectors.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (1.0 - dot).clamp(0.0, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embedding_is_unit_length_and_deterministic() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("numeric column amount mean 42").await.unwrap();
        let b = embedder.embed("numeric column amount mean 42").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_EMBEDDING_DIM);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_text_embeds_to_zero_vector() {
        let embedder = HashEmbedder::new();
        let v = embedder.embed("!!! --- ???").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_tokenizer_splits_on_non_alnum() {
        assert_eq!(
            HashEmbedder::tokenize("User_ID: 42,abc"),
            vec!["user", "id", "42", "abc"]
        );
    }

    #[tokio::test]
    async fn test_similar_texts_are_closer_than_different_ones() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("email column user addresses").await.unwrap();
        let b = embedder.embed("email column user names").await.unwrap();
        let c = embedder.embed("parquet row group compression").await.unwrap();

        assert!(cosine_distance(&a, &b) < cosine_distance(&a, &c));
    }

    #[tokio::test]
    async fn test_service_single_flight_caches_instance() {
        let service = EmbeddingService::hash_only();
        let first = service.get().await;
        let second = service.get().await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_failed_factory_falls_back_to_hash() {
        let service = EmbeddingService::with_factory(Box::new(|| {
            Box::pin(async {
                Err(crate::error::TablescopeError::embedding("model unavailable"))
            })
        }));
        let embedder = service.get().await;
        assert_eq!(embedder.name(), "hash-128");
        assert_eq!(embedder.dimension(), HASH_EMBEDDING_DIM);
    }
}
