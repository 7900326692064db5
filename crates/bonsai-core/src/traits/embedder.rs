//! Embedder trait: text to fixed-length vector.

use async_trait::async_trait;

use crate::error::Result;

/// Converts text into an embedding vector via some external model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, reported by the info endpoint.
    fn model(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, preserving input order.
    ///
    /// The default implementation embeds one text at a time.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
