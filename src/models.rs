use serde::{Deserialize, Serialize};

/// A reconstructed file returned from retrieval, ordered by relevance.
/// This is what callers forward to their LLM backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFile {
    pub path: String,
    pub language: String,
    pub content: String,
    pub score: f32,
}

/// Answer request
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
}

/// Answer response: the retrieved context for the question.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub question: String,
    pub files: Vec<ContextFile>,
}

/// Answer-all response: per-repo results, keyed by repo name. Results are
/// never fused across repos; failures are reported alongside.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerAllResponse {
    pub question: String,
    pub repos: std::collections::HashMap<String, Vec<ContextFile>>,
    pub errors: std::collections::HashMap<String, String>,
}

/// Chunk-level search request, for callers that want raw hits instead of
/// reconstructed files.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    10
}

/// A single chunk hit from vector search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub file_path: String,
    pub base_path: String,
    pub language: String,
    pub content: String,
    pub score: f32,
}

/// Chunk-level search response.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
}

/// Reindex request; branch defaults to the working copy's current branch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReindexRequest {
    #[serde(default)]
    pub branch: Option<String>,
}

/// Reindex response
#[derive(Debug, Clone, Serialize)]
pub struct ReindexResponse {
    pub repo: String,
    pub branch: String,
    pub indexed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// A configured repository as reported by the API.
#[derive(Debug, Clone, Serialize)]
pub struct RepoInfo {
    pub name: String,
    pub path: String,
    pub branch: String,
}

/// Vector store statistics for a repo's current branch collection.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub collection_name: String,
    pub total_vectors: u64,
    pub points_count: u64,
}
