//! Deterministic embedders and fixtures for tests.

use async_trait::async_trait;
use bonsai_core::error::{BonsaiError, Result};
use bonsai_core::traits::Embedder;
use bonsai_core::types::{Chunk, EmbeddedChunk};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Keyword groups; each group is one embedding dimension.
const KEYWORD_GROUPS: &[&[&str]] = &[
    &["water", "水"],
    &["prun", "剪定", "branch", "枝"],
    &["soil", "用土", "repot", "植え替え"],
];

/// Bag-of-keywords embedder: one dimension per keyword group plus a constant
/// bias dimension so no text maps to the zero vector.
#[derive(Debug, Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn dim(&self) -> usize {
        KEYWORD_GROUPS.len() + 1
    }

    /// Number of `embed` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = KEYWORD_GROUPS
            .iter()
            .map(|group| group.iter().map(|kw| lower.matches(kw).count()).sum::<usize>() as f32)
            .collect();
        v.push(0.1);
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model(&self) -> &str {
        "keyword-test"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(Self::vector_for(text))
    }
}

/// Embedder that always fails like an unreachable API.
#[derive(Debug, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model(&self) -> &str {
        "failing-test"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(BonsaiError::Upstream("embedding service unreachable".into()))
    }
}

pub fn chunk(title: &str, category: &str, content: &str) -> Chunk {
    Chunk {
        title: title.into(),
        category: category.into(),
        summary: format!("{title} summary"),
        content: content.into(),
    }
}

pub fn embedded(title: &str, category: &str, embedding: Vec<f32>) -> EmbeddedChunk {
    EmbeddedChunk {
        chunk: chunk(title, category, &format!("{title} content")),
        embedding,
    }
}

/// Three chunks about watering, pruning and soil.
pub fn bonsai_chunks() -> Vec<Chunk> {
    vec![
        chunk("水やりの基本", "watering", "Water your bonsai when the soil surface dries; in summer water twice a day."),
        chunk("剪定のコツ", "pruning", "Prune long branches in early spring to keep the shape compact."),
        chunk("用土の選び方", "soil", "Use well-draining akadama soil and repot every two years."),
    ]
}

/// [`bonsai_chunks`] annotated with [`KeywordEmbedder`] vectors.
pub fn bonsai_embedded_chunks() -> Vec<EmbeddedChunk> {
    bonsai_chunks()
        .into_iter()
        .map(|chunk| {
            let embedding = KeywordEmbedder::vector_for(&chunk.content);
            EmbeddedChunk { chunk, embedding }
        })
        .collect()
}
