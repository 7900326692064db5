//! # Bonsai Sensei Providers
//!
//! External model access. Every supported backend speaks the OpenAI wire
//! format, so a single `OpenAiCompatibleProvider` covers both the embedding
//! and the chat-completion side.

pub mod openai_compatible;
pub mod provider_registry;

use bonsai_core::config::LlmConfig;
use bonsai_core::error::{BonsaiError, Result};

pub use openai_compatible::OpenAiCompatibleProvider;

/// Create a provider from the `[llm]` configuration section.
///
/// Fails with `BonsaiError::Config` for an unknown provider name or a missing
/// credential.
pub fn create_provider(llm: &LlmConfig) -> Result<OpenAiCompatibleProvider> {
    let provider_name = llm.provider.as_str();
    match provider_name {
        // Custom endpoint: "custom:https://my-server.com/v1"
        other if other.starts_with("custom:") => OpenAiCompatibleProvider::custom(other, llm),
        _ => {
            let registry = provider_registry::get_provider_config(provider_name).ok_or_else(|| {
                BonsaiError::Config(format!(
                    "unknown provider '{}' (known: {})",
                    provider_name,
                    available_providers().join(", ")
                ))
            })?;
            OpenAiCompatibleProvider::from_registry(registry, llm)
        }
    }
}

/// List all available provider names.
pub fn available_providers() -> Vec<&'static str> {
    let mut names = provider_registry::all_provider_names();
    names.push("custom");
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider() {
        let llm = LlmConfig {
            provider: "nonexistent".into(),
            ..Default::default()
        };
        let err = create_provider(&llm).err().unwrap();
        assert!(matches!(err, BonsaiError::Config(_)));
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_local_provider_needs_no_key() {
        let llm = LlmConfig {
            provider: "ollama".into(),
            ..Default::default()
        };
        assert!(create_provider(&llm).is_ok());
    }

    #[test]
    fn test_available_providers_includes_custom() {
        let names = available_providers();
        assert!(names.contains(&"openai"));
        assert!(names.contains(&"custom"));
    }
}
