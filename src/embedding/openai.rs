//! OpenAI-compatible embedding provider.

use serde::{Deserialize, Serialize};

use super::{EmbeddingClient, EMBED_TIMEOUT};
use crate::error::{Error, Result};

const MODEL_SMALL: &str = "text-embedding-3-small";
const MODEL_LARGE: &str = "text-embedding-3-large";
const DIM_SMALL: usize = 1536;
const DIM_LARGE: usize = 3072;

pub struct OpenAiEmbedding {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("openai api key is required".to_string()));
        }

        let model = if model.is_empty() {
            MODEL_SMALL.to_string()
        } else {
            model
        };

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
            api_key,
            model,
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let req = EmbedRequest {
            model: self.model.clone(),
            input: vec![text.to_string()],
        };

        let resp = self
            .client
            .post(&url)
            .timeout(EMBED_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("openai embed request: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transient(format!(
                "openai embed returned {status}: {body}"
            )));
        }

        let body: EmbedResponse = resp.json().await?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Transient("no embedding returned".to_string()))
    }

    fn dimensions(&self) -> usize {
        if self.model == MODEL_LARGE {
            DIM_LARGE
        } else {
            DIM_SMALL
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_by_model() {
        let small = OpenAiEmbedding::new("k".into(), MODEL_SMALL.into(), None).unwrap();
        assert_eq!(small.dimensions(), 1536);

        let large = OpenAiEmbedding::new("k".into(), MODEL_LARGE.into(), None).unwrap();
        assert_eq!(large.dimensions(), 3072);
    }

    #[test]
    fn test_default_model() {
        let client = OpenAiEmbedding::new("k".into(), String::new(), None).unwrap();
        assert_eq!(client.model_name(), MODEL_SMALL);
    }

    #[test]
    fn test_missing_key_rejected() {
        assert!(OpenAiEmbedding::new(String::new(), MODEL_SMALL.into(), None).is_err());
    }

    #[test]
    fn test_custom_base_url() {
        let client = OpenAiEmbedding::new(
            "k".into(),
            MODEL_SMALL.into(),
            Some("http://localhost:8080".into()),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
