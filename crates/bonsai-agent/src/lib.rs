//! # Bonsai Sensei Agent
//! Retrieve-then-generate pipeline: question in, signed answer plus the
//! chunks it was grounded on out.
//!
//! ## Flow
//! 1. Validate the question and `top_k`
//! 2. Retrieve the top-K chunks (cosine or flat index, chosen at startup)
//! 3. Generate the answer from those chunks, or fall back when none match

pub mod generator;
pub mod prompt;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use bonsai_core::config::RetrievalConfig;
use bonsai_core::error::{BonsaiError, Result};
use bonsai_core::types::AnswerResponse;
use bonsai_knowledge::Retriever;
use std::sync::Arc;

pub use generator::AnswerGenerator;

/// The Q&A agent shared by every request.
pub struct Agent {
    retriever: Arc<dyn Retriever>,
    generator: AnswerGenerator,
    default_top_k: usize,
    max_top_k: usize,
}

impl Agent {
    pub fn new(retriever: Arc<dyn Retriever>, generator: AnswerGenerator, retrieval: &RetrievalConfig) -> Self {
        Self {
            retriever,
            generator,
            default_top_k: retrieval.default_top_k,
            max_top_k: retrieval.max_top_k,
        }
    }

    pub fn retriever(&self) -> &dyn Retriever {
        self.retriever.as_ref()
    }

    pub fn generator(&self) -> &AnswerGenerator {
        &self.generator
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub fn max_top_k(&self) -> usize {
        self.max_top_k
    }

    /// Resolve the requested `top_k` against the configured default and limit.
    pub fn resolve_top_k(&self, top_k: Option<usize>) -> Result<usize> {
        let k = top_k.unwrap_or(self.default_top_k);
        if k == 0 || k > self.max_top_k {
            return Err(BonsaiError::InvalidRequest(format!(
                "top_k must be between 1 and {}, got {k}",
                self.max_top_k
            )));
        }
        Ok(k)
    }

    /// Answer one question.
    pub async fn ask(&self, question: &str, top_k: Option<usize>) -> Result<AnswerResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(BonsaiError::InvalidRequest("question must not be empty".into()));
        }
        let k = self.resolve_top_k(top_k)?;

        let started = std::time::Instant::now();
        let matched_chunks = self.retriever.search(question, k).await?;
        tracing::debug!(
            retriever = self.retriever.kind(),
            top_k = k,
            hits = matched_chunks.len(),
            "retrieved knowledge"
        );

        let answer = self.generator.generate(question, &matched_chunks).await?;
        tracing::info!(
            hits = matched_chunks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "question answered"
        );
        Ok(AnswerResponse { answer, matched_chunks })
    }
}
