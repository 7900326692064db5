//! Turns retrieved chunks into a grounded, signed answer.

use bonsai_core::config::{AnswerConfig, AnswerMode, LlmConfig};
use bonsai_core::error::Result;
use bonsai_core::traits::{ChatModel, GenerateParams};
use bonsai_core::types::SearchResult;
use std::sync::Arc;

use crate::prompt::{build_messages, sign};

pub struct AnswerGenerator {
    chat: Arc<dyn ChatModel>,
    params: GenerateParams,
    answer: AnswerConfig,
}

impl AnswerGenerator {
    pub fn new(chat: Arc<dyn ChatModel>, params: GenerateParams, answer: AnswerConfig) -> Self {
        Self { chat, params, answer }
    }

    /// Build from the `[llm]` and `[answer]` config sections.
    pub fn from_config(chat: Arc<dyn ChatModel>, llm: &LlmConfig, answer: &AnswerConfig) -> Self {
        let params = GenerateParams {
            model: llm.chat_model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
        };
        Self::new(chat, params, answer.clone())
    }

    pub fn mode(&self) -> AnswerMode {
        self.answer.mode
    }

    pub fn params(&self) -> &GenerateParams {
        &self.params
    }

    /// Produce the answer for `question` from `top_chunks` (rank order).
    ///
    /// With no chunks the fallback sentence is returned without calling the
    /// model. Every answer carries the signature.
    pub async fn generate(&self, question: &str, top_chunks: &[SearchResult]) -> Result<String> {
        if top_chunks.is_empty() {
            tracing::debug!("no knowledge retrieved, answering with fallback");
            return Ok(sign(&self.answer.fallback_message, &self.answer.signature));
        }

        let body = match self.answer.mode {
            AnswerMode::Excerpt => top_chunks[0].content.clone(),
            AnswerMode::Generate => {
                let messages = build_messages(&self.answer.system_prompt, question, top_chunks);
                self.chat.complete(&messages, &self.params).await?
            }
        };
        Ok(sign(&body, &self.answer.signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingChat, ScriptedChat};
    use bonsai_core::config::DEFAULT_FALLBACK_MESSAGE;
    use bonsai_core::error::BonsaiError;
    use bonsai_core::types::Role;

    fn hit(rank: usize, title: &str, content: &str) -> SearchResult {
        SearchResult {
            rank,
            title: title.into(),
            category: "watering".into(),
            summary: "s".into(),
            content: content.into(),
            score: 0.8,
            distance: None,
        }
    }

    fn generator(chat: Arc<dyn ChatModel>, mode: AnswerMode) -> AnswerGenerator {
        let answer = AnswerConfig { mode, ..Default::default() };
        AnswerGenerator::from_config(chat, &LlmConfig::default(), &answer)
    }

    #[tokio::test]
    async fn test_generate_appends_signature() {
        let chat = Arc::new(ScriptedChat::new("土が乾いたら水をやりましょう。"));
        let g = generator(chat.clone(), AnswerMode::Generate);
        let answer = g.generate("水やりは？", &[hit(1, "水やり", "乾いたら")]).await.unwrap();
        assert_eq!(answer, "土が乾いたら水をやりましょう。\n\n盆栽枯らしたらもったいない。北谷隆一");
    }

    #[tokio::test]
    async fn test_generate_sends_persona_and_knowledge() {
        let chat = Arc::new(ScriptedChat::new("ok"));
        let g = generator(chat.clone(), AnswerMode::Generate);
        g.generate("剪定の時期は？", &[hit(1, "剪定", "春に切る")]).await.unwrap();

        let (messages, params) = chat.last_request().unwrap();
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains(DEFAULT_FALLBACK_MESSAGE));
        assert!(messages[1].content.contains("剪定の時期は？"));
        assert!(messages[1].content.contains("本文: 春に切る"));
        assert_eq!(params.model, "gpt-3.5-turbo");
        assert!((params.temperature - 0.3).abs() < 1e-6);
        assert_eq!(params.max_tokens, 512);
    }

    #[tokio::test]
    async fn test_excerpt_mode_skips_model() {
        let chat = Arc::new(ScriptedChat::new("unused"));
        let g = generator(chat.clone(), AnswerMode::Excerpt);
        let answer = g
            .generate("q", &[hit(1, "a", "best content"), hit(2, "b", "other")])
            .await
            .unwrap();
        assert!(answer.starts_with("best content\n\n"));
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_chunks_returns_fallback() {
        let chat = Arc::new(ScriptedChat::new("unused"));
        let g = generator(chat.clone(), AnswerMode::Generate);
        let answer = g.generate("q", &[]).await.unwrap();
        assert!(answer.starts_with(DEFAULT_FALLBACK_MESSAGE));
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let g = generator(Arc::new(FailingChat), AnswerMode::Generate);
        let err = g.generate("q", &[hit(1, "a", "b")]).await.unwrap_err();
        assert!(matches!(err, BonsaiError::Upstream(_)));
    }
}
