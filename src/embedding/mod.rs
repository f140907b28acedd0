//! Embedding provider contract and selection.
//!
//! The core only depends on the [`EmbeddingClient`] trait; concrete
//! providers map text to a fixed-dimension vector over HTTP. Provider
//! choice is a tagged enum resolved once at startup.

pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-call deadline for embedding requests.
pub const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Maps text to a fixed-dimension vector.
///
/// Vectors need not be deterministic across calls, but the declared
/// dimension must match what the vector store collection was created with.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    /// Model identifier, for logs and diagnostics.
    fn model_name(&self) -> &str;
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum EmbeddingConfig {
    Ollama {
        url: String,
        model: String,
    },
    #[serde(rename = "openai")]
    OpenAi {
        api_key: String,
        model: String,
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl EmbeddingConfig {
    /// Construct the configured provider.
    pub fn build(&self) -> Result<Arc<dyn EmbeddingClient>> {
        match self {
            EmbeddingConfig::Ollama { url, model } => Ok(Arc::new(
                ollama::OllamaEmbedding::new(url.clone(), model.clone()),
            )),
            EmbeddingConfig::OpenAi {
                api_key,
                model,
                base_url,
            } => Ok(Arc::new(openai::OpenAiEmbedding::new(
                api_key.clone(),
                model.clone(),
                base_url.clone(),
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_config_builds() {
        let config = EmbeddingConfig::Ollama {
            url: "http://localhost:11434".to_string(),
            model: "bge-m3".to_string(),
        };
        let client = config.build().unwrap();
        assert_eq!(client.dimensions(), 1024);
        assert_eq!(client.model_name(), "bge-m3");
    }

    #[test]
    fn test_openai_config_builds() {
        let config = EmbeddingConfig::OpenAi {
            api_key: "sk-test".to_string(),
            model: "text-embedding-3-small".to_string(),
            base_url: None,
        };
        let client = config.build().unwrap();
        assert_eq!(client.dimensions(), 1536);
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config = EmbeddingConfig::OpenAi {
            api_key: String::new(),
            model: "text-embedding-3-small".to_string(),
            base_url: None,
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn test_config_deserializes_tagged() {
        let config: EmbeddingConfig = serde_json::from_str(
            r#"{"provider":"ollama","url":"http://localhost:11434","model":"bge-m3"}"#,
        )
        .unwrap();
        assert!(matches!(config, EmbeddingConfig::Ollama { .. }));
    }
}
