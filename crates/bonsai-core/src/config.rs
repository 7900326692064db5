//! Bonsai Sensei configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BonsaiError, Result};

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV: &str = "BONSAI_CONFIG";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BonsaiConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl BonsaiConfig {
    /// Load config from `$BONSAI_CONFIG`, else the default path.
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BonsaiError::Config(format!("Failed to read config {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| BonsaiError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every request fail.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.default_top_k == 0 {
            return Err(BonsaiError::Config("retrieval.default_top_k must be at least 1".into()));
        }
        if self.retrieval.default_top_k > self.retrieval.max_top_k {
            return Err(BonsaiError::Config(format!(
                "retrieval.default_top_k ({}) exceeds retrieval.max_top_k ({})",
                self.retrieval.default_top_k, self.retrieval.max_top_k
            )));
        }
        Ok(())
    }

    /// `./bonsai.toml` if present, otherwise `~/.bonsai/config.toml`.
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from("bonsai.toml");
        if local.exists() {
            return local;
        }
        Self::home_dir().join("config.toml")
    }

    /// Get the Bonsai Sensei home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".bonsai")
    }
}

/// External model provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    /// Overrides the provider's base URL when non-empty.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String { "openai".into() }
fn default_embedding_model() -> String { "text-embedding-ada-002".into() }
fn default_chat_model() -> String { "gpt-3.5-turbo".into() }
fn default_temperature() -> f32 { 0.3 }
fn default_max_tokens() -> u32 { 512 }
fn default_timeout_secs() -> u64 { 60 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            endpoint: String::new(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key: `llm.api_key` first, then the given env vars in order.
    pub fn resolve_api_key(&self, env_keys: &[&str]) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        env_keys
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|key| !key.trim().is_empty())
    }
}

/// Locations of the knowledge files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_knowledge_dir")]
    pub dir: String,
    #[serde(default = "default_chunks_file")]
    pub chunks_file: String,
    #[serde(default = "default_embedded_file")]
    pub embedded_file: String,
    #[serde(default = "default_index_file")]
    pub index_file: String,
    #[serde(default = "default_meta_file")]
    pub meta_file: String,
}

fn default_knowledge_dir() -> String { "knowledge".into() }
fn default_chunks_file() -> String { "bonsai_all_chunks.json".into() }
fn default_embedded_file() -> String { "bonsai_all_chunks_with_embeddings.json".into() }
fn default_index_file() -> String { "bonsai_flat_l2.index".into() }
fn default_meta_file() -> String { "bonsai_flat_l2_meta.json".into() }

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            dir: default_knowledge_dir(),
            chunks_file: default_chunks_file(),
            embedded_file: default_embedded_file(),
            index_file: default_index_file(),
            meta_file: default_meta_file(),
        }
    }
}

impl KnowledgeConfig {
    fn resolve(&self, file: &str) -> PathBuf {
        let dir = shellexpand::tilde(&self.dir).to_string();
        PathBuf::from(dir).join(shellexpand::tilde(file).as_ref())
    }

    pub fn chunks_path(&self) -> PathBuf {
        self.resolve(&self.chunks_file)
    }

    pub fn embedded_path(&self) -> PathBuf {
        self.resolve(&self.embedded_file)
    }

    pub fn index_path(&self) -> PathBuf {
        self.resolve(&self.index_file)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.resolve(&self.meta_file)
    }
}

/// Which retrieval path serves queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Prebuilt flat L2 index + metadata sidecar.
    #[default]
    Index,
    /// In-memory cosine similarity over cached chunk embeddings.
    Cosine,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Index => "index",
            RetrievalMode::Cosine => "cosine",
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub mode: RetrievalMode,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

fn default_top_k() -> usize { 3 }
fn default_max_top_k() -> usize { 10 }

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::default(),
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

/// How the answer text is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// Ask the chat model, grounded on the retrieved chunks.
    #[default]
    Generate,
    /// Return the best chunk's content verbatim, no chat call.
    Excerpt,
}

/// Persona and answer-shaping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    #[serde(default)]
    pub mode: AnswerMode,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
    #[serde(default = "default_signature")]
    pub signature: String,
}

pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "ごめんなさい、この質問には北谷氏の知識の範囲ではお答えできません";

fn default_system_prompt() -> String {
    format!(
        "あなたは盆栽のプロフェッショナルです。以下のナレッジのみを根拠に、ユーザーの質問に対して初心者にもわかりやすく日本語で回答してください。\
         ナレッジ以外の情報や推測は使わず、北谷隆一氏の知識のみを根拠にしてください。\
         もしナレッジ内に該当情報がなければ『{DEFAULT_FALLBACK_MESSAGE}』と返してください。"
    )
}
fn default_fallback_message() -> String { DEFAULT_FALLBACK_MESSAGE.into() }
fn default_signature() -> String { "盆栽枯らしたらもったいない。北谷隆一".into() }

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            mode: AnswerMode::default(),
            system_prompt: default_system_prompt(),
            fallback_message: default_fallback_message(),
            signature: default_signature(),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 { 8000 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}
