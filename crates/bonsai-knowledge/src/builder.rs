//! Offline build steps: chunk embedding generation and flat index construction.
//!
//! Both are full rebuilds; running them twice over the same input produces
//! the same files.

use bonsai_core::error::{BonsaiError, Result};
use bonsai_core::traits::Embedder;
use bonsai_core::types::{Chunk, EmbeddedChunk};
use serde::Serialize;
use std::path::Path;

use crate::cache::validate_vector;
use crate::flat_index::FlatL2Index;
use crate::store::KnowledgeStore;

/// Summary of a completed build, printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildStats {
    pub chunks: usize,
    pub dim: usize,
}

/// Build a flat L2 index over precomputed embeddings, in input order, plus
/// the positionally aligned metadata list.
pub fn build_index(chunks: &[EmbeddedChunk]) -> Result<(FlatL2Index, Vec<Chunk>)> {
    let first = chunks
        .first()
        .ok_or_else(|| BonsaiError::Data("no chunks to index".into()))?;
    let mut index = FlatL2Index::new(first.embedding.len());
    let mut metadata = Vec::with_capacity(chunks.len());

    for (i, entry) in chunks.iter().enumerate() {
        validate_vector(i, &entry.embedding)?;
        index.add(&entry.embedding).map_err(|e| match e {
            BonsaiError::Data(msg) => BonsaiError::Data(format!("chunk {i}: {msg}")),
            other => other,
        })?;
        metadata.push(entry.chunk.clone());
    }
    Ok((index, metadata))
}

/// Read the embedded-chunk file and write the index and metadata files.
pub fn build_index_files(input: &Path, index_path: &Path, meta_path: &Path) -> Result<BuildStats> {
    let chunks = KnowledgeStore::load_embedded_chunks(input)?;
    let (index, metadata) = build_index(&chunks)?;
    index.save(index_path)?;
    KnowledgeStore::save_metadata(meta_path, &metadata)?;
    tracing::info!(
        chunks = index.len(),
        dim = index.dim(),
        index = %index_path.display(),
        meta = %meta_path.display(),
        "flat index written"
    );
    Ok(BuildStats { chunks: index.len(), dim: index.dim() })
}

/// Embed each chunk's content, one request per chunk, in input order.
pub async fn generate_embeddings(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<Vec<EmbeddedChunk>> {
    let total = chunks.len();
    let mut out = Vec::with_capacity(total);
    for (i, chunk) in chunks.into_iter().enumerate() {
        let embedding = embedder.embed(&chunk.content).await?;
        validate_vector(i, &embedding)?;
        tracing::info!("embedding {}/{}: {}", i + 1, total, chunk.title);
        out.push(EmbeddedChunk { chunk, embedding });
    }
    Ok(out)
}

/// Read the chunk file, embed every chunk, write the embedded-chunk file.
pub async fn generate_embedding_file(input: &Path, output: &Path, embedder: &dyn Embedder) -> Result<BuildStats> {
    let chunks = KnowledgeStore::load_chunks(input)?;
    let embedded = generate_embeddings(chunks, embedder).await?;
    KnowledgeStore::save_embedded_chunks(output, &embedded)?;
    let dim = embedded.first().map(|e| e.embedding.len()).unwrap_or(0);
    tracing::info!(chunks = embedded.len(), output = %output.display(), "embeddings written");
    Ok(BuildStats { chunks: embedded.len(), dim })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, KeywordEmbedder, bonsai_chunks, bonsai_embedded_chunks, embedded};
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bonsai-builder-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_build_index_keeps_input_order() {
        let chunks = bonsai_embedded_chunks();
        let (index, meta) = build_index(&chunks).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(meta.len(), 3);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(meta[i], c.chunk);
            assert_eq!(index.vector(i).unwrap(), c.embedding.as_slice());
        }
    }

    #[test]
    fn test_build_index_rejects_bad_input() {
        assert!(matches!(build_index(&[]), Err(BonsaiError::Data(_))));

        let mixed = vec![embedded("a", "x", vec![1.0, 0.0]), embedded("b", "y", vec![1.0])];
        let err = build_index(&mixed).unwrap_err();
        assert!(err.to_string().contains("chunk 1"));

        let zero = vec![embedded("a", "x", vec![0.0, 0.0])];
        assert!(build_index(&zero).is_err());
    }

    #[test]
    fn test_build_index_files_roundtrip() {
        let dir = temp_dir("files");
        let input = dir.join("embedded.json");
        KnowledgeStore::save_embedded_chunks(&input, &bonsai_embedded_chunks()).unwrap();

        let index_path = dir.join("kb.index");
        let meta_path = dir.join("kb_meta.json");
        let stats = build_index_files(&input, &index_path, &meta_path).unwrap();
        assert_eq!(stats, BuildStats { chunks: 3, dim: 4 });

        let index = FlatL2Index::load(&index_path).unwrap();
        let meta = KnowledgeStore::load_metadata(&meta_path).unwrap();
        assert_eq!(index.len(), meta.len());
        assert_eq!(meta[2].category, "soil");

        // Rebuilding produces identical bytes.
        let first = std::fs::read(&index_path).unwrap();
        build_index_files(&input, &index_path, &meta_path).unwrap();
        assert_eq!(std::fs::read(&index_path).unwrap(), first);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_generate_embedding_file() {
        let dir = temp_dir("embed");
        let input = dir.join("chunks.json");
        std::fs::write(&input, serde_json::to_string(&bonsai_chunks()).unwrap()).unwrap();
        let output = dir.join("embedded.json");

        let embedder = KeywordEmbedder::default();
        let stats = generate_embedding_file(&input, &output, &embedder).await.unwrap();
        assert_eq!(stats.chunks, 3);
        assert_eq!(embedder.calls(), 3);

        let back = KnowledgeStore::load_embedded_chunks(&output).unwrap();
        assert_eq!(back, bonsai_embedded_chunks());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_generate_embeddings_propagates_upstream_error() {
        let err = generate_embeddings(bonsai_chunks(), &FailingEmbedder).await.unwrap_err();
        assert!(matches!(err, BonsaiError::Upstream(_)));
    }
}
