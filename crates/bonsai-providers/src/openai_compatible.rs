//! Unified OpenAI-compatible provider.
//!
//! A single struct that serves both embeddings and chat completions for any
//! OpenAI-compatible API. Providers differ only by endpoint URL, auth style
//! and API key. Every call is a single attempt; failures surface as
//! `BonsaiError::Upstream`.

use async_trait::async_trait;
use bonsai_core::config::LlmConfig;
use bonsai_core::error::{BonsaiError, Result};
use bonsai_core::traits::{ChatModel, Embedder, GenerateParams};
use bonsai_core::types::Message;
use serde_json::{Value, json};
use std::time::Duration;

use crate::provider_registry::{AuthStyle, ProviderConfig};

/// A unified provider that works with any OpenAI-compatible API.
pub struct OpenAiCompatibleProvider {
    /// Provider name (e.g., "openai", "ollama").
    name: String,
    /// API key for authentication.
    api_key: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    base_url: String,
    chat_path: String,
    embeddings_path: String,
    auth_style: AuthStyle,
    /// Model used for every embedding request.
    embedding_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Create from a known provider config + `[llm]` settings.
    ///
    /// Resolution order:
    /// - API key: `llm.api_key` > registry env vars
    /// - Base URL: `llm.endpoint` > env override > registry default
    ///
    /// A provider that requires auth but has no key is a `Config` error, so
    /// the process refuses to start instead of failing on the first request.
    pub fn from_registry(registry: &ProviderConfig, llm: &LlmConfig) -> Result<Self> {
        let api_key = llm.resolve_api_key(registry.env_keys).unwrap_or_default();
        if registry.auth_style == AuthStyle::Bearer && api_key.is_empty() {
            return Err(BonsaiError::Config(format!(
                "no API key for provider '{}': set llm.api_key or one of {:?}",
                registry.name, registry.env_keys
            )));
        }

        // Local servers accept an optional key; send it when one is configured.
        let auth_style = if registry.auth_style == AuthStyle::None && !api_key.is_empty() {
            AuthStyle::Bearer
        } else {
            registry.auth_style
        };

        let base_url = if !llm.endpoint.is_empty() {
            llm.endpoint.trim_end_matches('/').to_string()
        } else {
            registry
                .base_url_env
                .and_then(|env_key| {
                    let val = std::env::var(env_key).ok()?;
                    // OLLAMA_HOST and friends are usually given without /v1
                    if val.ends_with("/v1") {
                        Some(val)
                    } else {
                        Some(format!("{}/v1", val.trim_end_matches('/')))
                    }
                })
                .unwrap_or_else(|| registry.base_url.to_string())
        };

        Ok(Self {
            name: registry.name.to_string(),
            api_key,
            base_url,
            chat_path: registry.chat_path.to_string(),
            embeddings_path: registry.embeddings_path.to_string(),
            auth_style,
            embedding_model: llm.embedding_model.clone(),
            client: build_client(llm.timeout_secs)?,
        })
    }

    /// Create for a custom endpoint (e.g., "custom:https://my-server.com/v1").
    pub fn custom(endpoint: &str, llm: &LlmConfig) -> Result<Self> {
        let base_url = endpoint
            .strip_prefix("custom:")
            .unwrap_or(endpoint)
            .trim_end_matches('/')
            .to_string();

        let api_key = llm.resolve_api_key(&["CUSTOM_API_KEY"]).unwrap_or_default();
        let auth_style = if api_key.is_empty() {
            AuthStyle::None
        } else {
            AuthStyle::Bearer
        };

        Ok(Self {
            name: "custom".to_string(),
            api_key,
            base_url,
            chat_path: "/chat/completions".to_string(),
            embeddings_path: "/embeddings".to_string(),
            auth_style,
            embedding_model: llm.embedding_model.clone(),
            client: build_client(llm.timeout_secs)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the auth header for the request.
    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer if !self.api_key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", self.api_key))
            }
            _ => req,
        }
    }

    /// POST a JSON body and return the parsed JSON response.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body);
        let req = self.apply_auth(req);

        let resp = req.send().await.map_err(|e| {
            BonsaiError::Upstream(format!("{} connection failed ({}): {}", self.name, url, e))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(BonsaiError::Upstream(format!(
                "{} API error {}: {}",
                self.name, status, text
            )));
        }

        resp.json()
            .await
            .map_err(|e| BonsaiError::Upstream(format!("{} returned invalid JSON: {}", self.name, e)))
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|e| BonsaiError::Config(format!("failed to build HTTP client: {e}")))
}

/// Extract vectors from an `/embeddings` response, ordered by `index`.
pub(crate) fn parse_embeddings(json: &Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json["data"]
        .as_array()
        .ok_or_else(|| BonsaiError::Upstream("No data in embeddings response".into()))?;
    if data.len() != expected {
        return Err(BonsaiError::Upstream(format!(
            "embeddings response has {} entries, expected {}",
            data.len(),
            expected
        )));
    }

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
        let values = item["embedding"]
            .as_array()
            .ok_or_else(|| BonsaiError::Upstream("embedding entry without vector".into()))?;
        let vector = values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| BonsaiError::Upstream("embedding contains non-numeric values".into()))?;
        if vector.is_empty() {
            return Err(BonsaiError::Upstream("embedding vector is empty".into()));
        }
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Extract the assistant text from a `/chat/completions` response.
pub(crate) fn parse_chat(json: &Value) -> Result<String> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| BonsaiError::Upstream("No choices in response".into()))?;
    choice["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| BonsaiError::Upstream("choice has no message content".into()))
}

#[async_trait]
impl Embedder for OpenAiCompatibleProvider {
    fn model(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| BonsaiError::Upstream("empty embeddings response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "model": self.embedding_model,
            "input": texts,
        });
        let json = self.post_json(&self.embeddings_path, &body).await?;
        let vectors = parse_embeddings(&json, texts.len())?;
        tracing::debug!(
            provider = %self.name,
            count = vectors.len(),
            dim = vectors.first().map(|v| v.len()).unwrap_or(0),
            "embeddings received"
        );
        Ok(vectors)
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, messages: &[Message], params: &GenerateParams) -> Result<String> {
        let body = json!({
            "model": params.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });
        let json = self.post_json(&self.chat_path, &body).await?;
        let content = parse_chat(&json)?;
        tracing::debug!(provider = %self.name, model = %params.model, chars = content.len(), "completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider_registry::get_provider_config;

    #[test]
    fn test_parse_embeddings_orders_by_index() {
        let json = json!({
            "data": [
                {"index": 1, "embedding": [3.0, 4.0]},
                {"index": 0, "embedding": [1.0, 2.0]},
            ]
        });
        let out = parse_embeddings(&json, 2).unwrap();
        assert_eq!(out, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_parse_embeddings_rejects_malformed() {
        let missing = json!({"error": "nope"});
        assert!(matches!(parse_embeddings(&missing, 1), Err(BonsaiError::Upstream(_))));

        let wrong_count = json!({"data": [{"index": 0, "embedding": [1.0]}]});
        assert!(parse_embeddings(&wrong_count, 2).is_err());

        let non_numeric = json!({"data": [{"index": 0, "embedding": [1.0, "x"]}]});
        assert!(parse_embeddings(&non_numeric, 1).is_err());

        let empty = json!({"data": [{"index": 0, "embedding": []}]});
        assert!(parse_embeddings(&empty, 1).is_err());
    }

    #[test]
    fn test_parse_chat() {
        let json = json!({"choices": [{"message": {"role": "assistant", "content": "  水は朝に。 \n"}}]});
        assert_eq!(parse_chat(&json).unwrap(), "水は朝に。");
        assert!(parse_chat(&json!({"choices": []})).is_err());
        assert!(parse_chat(&json!({"choices": [{"message": {}}]})).is_err());
    }

    fn keyed_registry(auth_style: AuthStyle) -> ProviderConfig {
        ProviderConfig {
            name: "keyed",
            base_url: "http://localhost:9999/v1",
            chat_path: "/chat/completions",
            embeddings_path: "/embeddings",
            env_keys: &["BONSAI_TEST_NEVER_SET_API_KEY"],
            auth_style,
            base_url_env: None,
        }
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let registry = keyed_registry(AuthStyle::Bearer);
        let err = OpenAiCompatibleProvider::from_registry(&registry, &LlmConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, BonsaiError::Config(_)));
        assert!(err.to_string().contains("BONSAI_TEST_NEVER_SET_API_KEY"));

        let llm = LlmConfig {
            api_key: "sk-config".into(),
            ..Default::default()
        };
        assert!(OpenAiCompatibleProvider::from_registry(&registry, &llm).is_ok());
    }

    #[test]
    fn test_optional_key_enables_bearer_auth() {
        let registry = keyed_registry(AuthStyle::None);
        let anonymous = OpenAiCompatibleProvider::from_registry(&registry, &LlmConfig::default()).unwrap();
        assert_eq!(anonymous.auth_style, AuthStyle::None);

        let llm = LlmConfig {
            api_key: "vllm-secret".into(),
            ..Default::default()
        };
        let keyed = OpenAiCompatibleProvider::from_registry(&registry, &llm).unwrap();
        assert_eq!(keyed.auth_style, AuthStyle::Bearer);
        let req = keyed.apply_auth(keyed.client.post("http://localhost:9999/v1/embeddings")).build().unwrap();
        assert_eq!(req.headers()["Authorization"], "Bearer vllm-secret");
    }

    #[test]
    fn test_endpoint_override() {
        let registry = get_provider_config("openai").unwrap();
        let llm = LlmConfig {
            api_key: "sk-test".into(),
            endpoint: "http://proxy.local/v1/".into(),
            ..Default::default()
        };
        let p = OpenAiCompatibleProvider::from_registry(registry, &llm).unwrap();
        assert_eq!(p.base_url(), "http://proxy.local/v1");
        assert_eq!(Embedder::model(&p), "text-embedding-ada-002");
        assert_eq!(ChatModel::name(&p), "openai");
    }

    #[test]
    fn test_custom_endpoint_without_key() {
        let llm = LlmConfig::default();
        let p = OpenAiCompatibleProvider::custom("custom:http://localhost:9999/v1", &llm).unwrap();
        assert_eq!(p.base_url(), "http://localhost:9999/v1");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        let llm = LlmConfig::default();
        let p = OpenAiCompatibleProvider::custom("custom:http://127.0.0.1:9", &llm).unwrap();
        let out = p.embed_batch(&[]).await.unwrap();
        assert!(out.is_empty());
    }
}
