//! Ollama embedding provider. Runs locally, so no source code leaves the
//! machine during indexing.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{EmbeddingClient, EMBED_TIMEOUT};
use crate::error::{Error, Result};

/// Known model dimensions, used for collection creation. Models not listed
/// here fall back to 1024 with a warning.
const BGE_M3_DIM: usize = 1024;
const MXBAI_DIM: usize = 1024;
const NOMIC_DIM: usize = 768;
const DEFAULT_DIM: usize = 1024;

pub struct OllamaEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask Ollama to truncate inputs that exceed the model context instead
    /// of returning a 400.
    truncate: bool,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedding {
    pub fn new(base_url: String, model: String) -> Self {
        let base_url = if base_url.is_empty() {
            "http://localhost:11434".to_string()
        } else {
            base_url
        };
        let model = if model.is_empty() {
            "bge-m3".to_string()
        } else {
            model
        };

        Self {
            client: reqwest::Client::new(),
            base_url,
            model,
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        let req = EmbedRequest {
            model: self.model.clone(),
            input: vec![text.to_string()],
            truncate: true,
        };

        let resp = self
            .client
            .post(&url)
            .timeout(EMBED_TIMEOUT)
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("ollama embed request: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transient(format!(
                "ollama embed returned {status}: {body}"
            )));
        }

        let body: EmbedResponse = resp.json().await?;
        body.embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Transient("empty embedding from ollama".to_string()))
    }

    fn dimensions(&self) -> usize {
        match self.model.trim_end_matches(":latest") {
            "bge-m3" => BGE_M3_DIM,
            "mxbai-embed-large" => MXBAI_DIM,
            "nomic-embed-text" => NOMIC_DIM,
            other => {
                warn!(model = other, assumed = DEFAULT_DIM, "unknown embedding model dimension");
                DEFAULT_DIM
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
