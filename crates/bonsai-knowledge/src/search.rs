//! Retrievers: query text in, ranked `SearchResult`s out.
//!
//! Both retrievers report `score` as higher-is-better relevance, so callers
//! never need to know which path produced a result.

use async_trait::async_trait;
use bonsai_core::error::{BonsaiError, Result};
use bonsai_core::traits::Embedder;
use bonsai_core::types::{Chunk, SearchResult};
use std::path::Path;
use std::sync::Arc;

use crate::cache::EmbeddingCache;
use crate::flat_index::FlatL2Index;
use crate::math::{cosine_similarity, distance_to_relevance};
use crate::store::KnowledgeStore;

/// Top-K retrieval over the knowledge base.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Short name of the retrieval path ("cosine" or "index").
    fn kind(&self) -> &'static str;

    /// Number of searchable chunks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding dimension, `None` when the knowledge base is empty.
    fn dim(&self) -> Option<usize>;

    /// Embed `query` and return at most `min(top_k, len())` ranked results.
    /// An empty knowledge base yields an empty list.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>>;
}

/// Brute-force cosine similarity over cached chunk embeddings.
pub struct CosineRetriever {
    cache: EmbeddingCache,
    embedder: Arc<dyn Embedder>,
}

impl CosineRetriever {
    pub fn new(cache: EmbeddingCache, embedder: Arc<dyn Embedder>) -> Self {
        Self { cache, embedder }
    }

    /// Rank cached chunks against an already-embedded query.
    ///
    /// Sorted by descending similarity; equal scores keep source order.
    pub fn search_embedding(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let Some(dim) = self.cache.dim() else {
            return Ok(Vec::new());
        };
        if query.len() != dim {
            return Err(BonsaiError::dimension_mismatch(dim, query.len()));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .cache
            .entries()
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (i, score))| {
                SearchResult::from_chunk(rank + 1, &self.cache.entries()[i].chunk, score, None)
            })
            .collect())
    }
}

#[async_trait]
impl Retriever for CosineRetriever {
    fn kind(&self) -> &'static str {
        "cosine"
    }

    fn len(&self) -> usize {
        self.cache.len()
    }

    fn dim(&self) -> Option<usize> {
        self.cache.dim()
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if self.cache.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query).await?;
        self.search_embedding(&embedding, top_k)
    }
}

/// Exact L2 search over a prebuilt flat index plus its metadata sidecar.
pub struct IndexRetriever {
    index: FlatL2Index,
    metadata: Vec<Chunk>,
    embedder: Arc<dyn Embedder>,
}

impl IndexRetriever {
    /// Pair an index with its metadata. The metadata must cover every
    /// indexed position; extra trailing metadata entries are ignored.
    pub fn new(index: FlatL2Index, metadata: Vec<Chunk>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if metadata.len() < index.len() {
            return Err(BonsaiError::Data(format!(
                "metadata has {} entries but the index holds {} vectors; rebuild both together",
                metadata.len(),
                index.len()
            )));
        }
        if metadata.len() > index.len() {
            tracing::warn!(
                metadata = metadata.len(),
                vectors = index.len(),
                "metadata sidecar longer than index, extra entries are unreachable"
            );
        }
        Ok(Self { index, metadata, embedder })
    }

    /// Load the index and metadata files once.
    pub fn open(index_path: &Path, meta_path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let index = FlatL2Index::load(index_path)?;
        let metadata = KnowledgeStore::load_metadata(meta_path)?;
        tracing::info!(
            vectors = index.len(),
            dim = index.dim(),
            index = %index_path.display(),
            "flat index loaded"
        );
        Self::new(index, metadata, embedder)
    }

    /// Rank indexed chunks against an already-embedded query.
    ///
    /// `distance` is the squared L2 distance; `score` is `1 / (1 + distance)`.
    pub fn search_embedding(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let hits = self.index.search(query, top_k)?;
        hits.into_iter()
            .enumerate()
            .map(|(rank, (position, distance))| {
                let chunk = self.metadata.get(position).ok_or_else(|| {
                    BonsaiError::Data(format!("index position {position} has no metadata"))
                })?;
                Ok(SearchResult::from_chunk(
                    rank + 1,
                    chunk,
                    distance_to_relevance(distance),
                    Some(distance),
                ))
            })
            .collect()
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    fn kind(&self) -> &'static str {
        "index"
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn dim(&self) -> Option<usize> {
        if self.index.is_empty() { None } else { Some(self.index.dim()) }
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if self.index.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query).await?;
        self.search_embedding(&embedding, top_k)
    }
}
