//! # Bonsai Sensei Knowledge Base
//!
//! Vector retrieval over a small, fixed set of bonsai-care chunks.
//!
//! ## Design
//! - **Knowledge files**: JSON chunk lists, optionally annotated with embeddings
//! - **Flat L2 index**: exact linear scan, persisted next to a metadata sidecar
//! - **Two retrievers**: in-memory cosine over cached embeddings, or the flat index
//! - **One score direction**: every result's `score` is higher-is-better
//!
//! ## How it works
//! ```text
//! bonsai embed        chunks.json ──embed──▶ chunks_with_embeddings.json
//! bonsai build-index  chunks_with_embeddings.json ──▶ flat.index + meta.json
//! bonsai serve        question ──embed──▶ top-K chunks ──▶ answer
//! ```

pub mod builder;
pub mod cache;
pub mod flat_index;
pub mod math;
pub mod search;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use builder::{BuildStats, build_index, build_index_files, generate_embedding_file, generate_embeddings};
pub use cache::EmbeddingCache;
pub use flat_index::FlatL2Index;
pub use search::{CosineRetriever, IndexRetriever, Retriever};
pub use store::KnowledgeStore;
