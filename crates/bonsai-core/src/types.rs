//! Knowledge data model and chat message types.

use serde::{Deserialize, Deserializer, Serialize};

/// One unit of knowledge-base text.
///
/// Identity is the position in the source list; chunks are never mutated
/// after load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

/// Missing and `null` text fields both load as an empty string.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A chunk annotated with its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A ranked retrieval hit.
///
/// `score` is a relevance score where higher is always better:
/// cosine similarity for the in-memory path, `1 / (1 + distance)` for the
/// flat index path. `distance` carries the raw squared L2 distance when the
/// hit came from the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// 1-based rank.
    pub rank: usize,
    pub title: String,
    pub category: String,
    pub summary: String,
    pub content: String,
    pub score: f32,
    #[serde(default)]
    pub distance: Option<f32>,
}

impl SearchResult {
    pub fn from_chunk(rank: usize, chunk: &Chunk, score: f32, distance: Option<f32>) -> Self {
        Self {
            rank,
            title: chunk.title.clone(),
            category: chunk.category.clone(),
            summary: chunk.summary.clone(),
            content: chunk.content.clone(),
            score,
            distance,
        }
    }
}

/// Result of the retrieve-then-generate pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub matched_chunks: Vec<SearchResult>,
}

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Chat message sent to a completion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}
