//! Chunk embedding cache for the in-memory cosine retriever.
//!
//! Built once at startup and never mutated. Changing the knowledge base
//! means restarting the process.

use bonsai_core::error::{BonsaiError, Result};
use bonsai_core::traits::Embedder;
use bonsai_core::types::{Chunk, EmbeddedChunk};

use crate::math::{is_finite_vector, is_zero_vector};

#[derive(Debug, Clone, Default)]
pub struct EmbeddingCache {
    entries: Vec<EmbeddedChunk>,
    dim: Option<usize>,
}

impl EmbeddingCache {
    /// Wrap precomputed embeddings, validating that every vector has the same
    /// dimension, is finite and has a non-zero norm.
    pub fn from_embedded(entries: Vec<EmbeddedChunk>) -> Result<Self> {
        let mut dim = None;
        for (i, entry) in entries.iter().enumerate() {
            validate_vector(i, &entry.embedding)?;
            match dim {
                None => dim = Some(entry.embedding.len()),
                Some(d) if d != entry.embedding.len() => {
                    return Err(BonsaiError::Data(format!(
                        "chunk {i} has embedding dimension {}, expected {d}",
                        entry.embedding.len()
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(Self { entries, dim })
    }

    /// Embed every chunk's content through `embedder` and cache the result.
    pub async fn build(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<Self> {
        if chunks.is_empty() {
            return Ok(Self::default());
        }
        tracing::info!(chunks = chunks.len(), model = embedder.model(), "embedding knowledge chunks");
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(BonsaiError::Upstream(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect();
        Self::from_embedded(entries)
    }

    pub fn entries(&self) -> &[EmbeddedChunk] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension, `None` for an empty cache.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }
}

/// Ingestion check shared by the cache and the index builder.
pub(crate) fn validate_vector(position: usize, v: &[f32]) -> Result<()> {
    if v.is_empty() {
        return Err(BonsaiError::Data(format!("chunk {position} has an empty embedding")));
    }
    if !is_finite_vector(v) {
        return Err(BonsaiError::Data(format!("chunk {position} embedding has non-finite values")));
    }
    if is_zero_vector(v) {
        return Err(BonsaiError::Data(format!("chunk {position} has an all-zero embedding")));
    }
    Ok(())
}
