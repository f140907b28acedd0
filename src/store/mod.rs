//! Vector store contract: branch-scoped collections of chunk records with
//! upsert/delete/search/scroll semantics.
//!
//! One collection exists per `{repo, branch}` pair; records from other
//! branches never appear in its results. Point identity is derived from the
//! chunk's `file_path`, so re-upserting the same path replaces the prior
//! record.

pub mod memory;
pub mod qdrant;

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::git::sanitize_branch;

/// Default cap for scroll requests; files rarely exceed 100 chunks.
pub const SCROLL_CAP: usize = 100;

/// Collection schema version, bumped when payload layout changes.
const SCHEMA_VERSION: u32 = 1;

/// Payload fields stored with every point and consumed by the retriever.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    /// `base_path` for single-chunk files, `base_path#chunk<i>` otherwise.
    pub file_path: String,
    /// Repo-relative path of the originating file.
    pub base_path: String,
    /// Chunk text exactly as embedded.
    pub content: String,
    /// Registry language tag.
    pub language: String,
    /// Hash of the whole originating file.
    pub file_hash: String,
    /// Position of this chunk within its file.
    pub chunk_index: usize,
}

/// A search hit with its cosine similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: StoredChunk,
    pub score: f32,
}

/// Collection-level statistics.
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_vectors: u64,
    pub points_count: u64,
    pub collection_name: String,
}

/// Branch-scoped vector database operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if absent. Fails if an existing collection was
    /// created with a different dimensionality.
    async fn ensure_collection(&self, dim: usize) -> Result<()>;

    /// Insert or replace the record for `chunk.file_path`.
    async fn upsert(&self, chunk: StoredChunk, vector: Vec<f32>) -> Result<()>;

    /// Remove every record whose `base_path` matches. Zero matches is fine.
    async fn delete_by_base_path(&self, base_path: &str) -> Result<()>;

    /// Nearest chunks by descending cosine similarity.
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>>;

    /// All records for a file, up to `cap`, in store order.
    async fn scroll_by_base_path(&self, base_path: &str, cap: usize) -> Result<Vec<StoredChunk>>;

    /// Drop the whole collection.
    async fn delete_collection(&self) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;

    async fn close(&self) -> Result<()>;

    fn collection_name(&self) -> &str;
}

/// Which backend to open branch-scoped collections against. Memory is for
/// tests and qdrant-less development runs.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Qdrant { url: String },
    Memory,
}

impl StoreConfig {
    /// Open a handle to the collection for one `{repo, branch}` pair.
    pub fn open(&self, repo_name: &str, branch: &str) -> Result<Arc<dyn VectorStore>> {
        let collection = collection_name(repo_name, branch);
        match self {
            StoreConfig::Qdrant { url } => {
                Ok(Arc::new(qdrant::QdrantStore::connect(url, collection)?))
            }
            StoreConfig::Memory => Ok(Arc::new(memory::MemoryStore::new(collection))),
        }
    }
}

/// Collection naming: `mesh-<repo>-<sanitized_branch>-v<schema>`.
pub fn collection_name(repo_name: &str, branch: &str) -> String {
    format!(
        "mesh-{repo_name}-{}-v{SCHEMA_VERSION}",
        sanitize_branch(branch)
    )
}

/// Store path for a chunk: the bare file path when a file produced a single
/// chunk, `path#chunk<i>` otherwise.
pub fn chunk_file_path(base_path: &str, chunk_index: usize, chunk_count: usize) -> String {
    if chunk_count > 1 {
        format!("{base_path}#chunk{chunk_index}")
    } else {
        base_path.to_string()
    }
}

/// Strip a `#chunk<i>` suffix, if any.
pub fn extract_base_path(file_path: &str) -> &str {
    match file_path.find("#chunk") {
        Some(idx) if idx > 0 => &file_path[..idx],
        _ => file_path,
    }
}

/// Parse the chunk index from a `#chunk<i>` suffix; bare paths are index 0.
pub fn extract_chunk_index(file_path: &str) -> usize {
    file_path
        .find("#chunk")
        .and_then(|idx| file_path[idx + "#chunk".len()..].parse().ok())
        .unwrap_or(0)
}

/// Deterministic 64-bit point id from a file path. Collisions silently
/// overwrite; accepted as a known limit of the id scheme.
pub fn point_id_for(file_path: &str) -> u64 {
    let digest = Sha256::digest(file_path.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
