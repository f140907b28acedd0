use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingConfig;
use crate::retrieve::RetrievalConfig;
use crate::store::StoreConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Where branch metadata is stored
    pub state_root: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Qdrant server URL; empty selects the in-memory store (dev mode)
    pub qdrant_url: String,
    /// Branch scanner interval in seconds
    pub scan_interval_secs: u64,
    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,
    /// Retrieval pipeline tuning
    pub retrieval: RetrievalConfig,
    /// Repositories served by this process
    pub repos: Vec<RepoEntry>,
}

/// One configured repository: a local working copy identified by name.
/// Focus paths and exclude patterns narrow answer output after retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub focus_paths: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_root: PathBuf::from(".mesh"),
            bind_addr: "127.0.0.1:8080".to_string(),
            qdrant_url: "http://localhost:6334".to_string(),
            scan_interval_secs: 10,
            embedding: EmbeddingConfig::Ollama {
                url: "http://localhost:11434".to_string(),
                model: "bge-m3".to_string(),
            },
            retrieval: RetrievalConfig::default(),
            repos: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("MESH_STATE_DIR") {
            config.state_root = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("MESH_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(url) = std::env::var("MESH_QDRANT_URL") {
            config.qdrant_url = url;
        }
        if let Ok(val) = std::env::var("MESH_SCAN_INTERVAL_SECS") {
            if let Ok(v) = val.parse() {
                config.scan_interval_secs = v;
            }
        }

        let provider = std::env::var("MESH_EMBEDDING_PROVIDER").unwrap_or_default();
        let model = std::env::var("MESH_EMBEDDING_MODEL").unwrap_or_default();
        match provider.as_str() {
            "openai" => {
                config.embedding = EmbeddingConfig::OpenAi {
                    api_key: std::env::var("MESH_OPENAI_API_KEY").unwrap_or_default(),
                    model,
                    base_url: std::env::var("MESH_OPENAI_BASE_URL").ok(),
                };
            }
            _ => {
                let url = std::env::var("MESH_OLLAMA_URL")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string());
                let model = if model.is_empty() {
                    "bge-m3".to_string()
                } else {
                    model
                };
                config.embedding = EmbeddingConfig::Ollama { url, model };
            }
        }

        if let Ok(val) = std::env::var("MESH_MAX_TOKEN_BUDGET") {
            if let Ok(v) = val.parse() {
                config.retrieval.max_token_budget = v;
            }
        }
        if let Ok(val) = std::env::var("MESH_RESERVE_TOKENS") {
            if let Ok(v) = val.parse() {
                config.retrieval.reserve_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("MESH_MAX_FILES") {
            if let Ok(v) = val.parse() {
                config.retrieval.max_files_limit = v;
            }
        }

        if let Ok(spec) = std::env::var("MESH_REPOS") {
            config.repos = parse_repos(&spec);
        }

        config
    }

    pub fn store_config(&self) -> StoreConfig {
        if self.qdrant_url.is_empty() {
            StoreConfig::Memory
        } else {
            StoreConfig::Qdrant {
                url: self.qdrant_url.clone(),
            }
        }
    }
}

/// Parse `MESH_REPOS`: semicolon-separated `name:path` pairs, e.g.
/// `backend:/srv/repos/backend;web:/srv/repos/web`. Malformed entries are
/// skipped.
fn parse_repos(spec: &str) -> Vec<RepoEntry> {
    spec.split(';')
        .filter_map(|entry| {
            let entry = entry.trim();
            let (name, path) = entry.split_once(':')?;
            let name = name.trim();
            let path = path.trim();
            if name.is_empty() || path.is_empty() {
                return None;
            }
            Some(RepoEntry {
                name: name.to_string(),
                path: PathBuf::from(path),
                focus_paths: Vec::new(),
                exclude_patterns: Vec::new(),
            })
        })
        .collect()
}
