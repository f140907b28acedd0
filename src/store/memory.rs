//! In-memory vector store with cosine similarity search. Backs the test
//! suite and qdrant-less development runs; implements the same contract as
//! the Qdrant adapter, including replacement on re-upsert.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};

use super::{point_id_for, ScoredChunk, StoreStats, StoredChunk, VectorStore};
use crate::error::{Error, Result};

pub struct MemoryStore {
    collection: String,
    dim: Mutex<Option<usize>>,
    entries: RwLock<HashMap<u64, (StoredChunk, Vec<f32>)>>,
}

impl MemoryStore {
    pub fn new(collection: String) -> Self {
        Self {
            collection,
            dim: Mutex::new(None),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

#[async_trait::async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(&self, dim: usize) -> Result<()> {
        let mut current = self.dim.lock();
        match *current {
            Some(existing) if existing != dim => Err(Error::Config(format!(
                "collection {} has dimension {existing}, embedding model produces {dim}",
                self.collection
            ))),
            Some(_) => Ok(()),
            None => {
                *current = Some(dim);
                Ok(())
            }
        }
    }

    async fn upsert(&self, chunk: StoredChunk, vector: Vec<f32>) -> Result<()> {
        let id = point_id_for(&chunk.file_path);
        self.entries.write().insert(id, (chunk, vector));
        Ok(())
    }

    async fn delete_by_base_path(&self, base_path: &str) -> Result<()> {
        self.entries
            .write()
            .retain(|_, (chunk, _)| chunk.base_path != base_path);
        Ok(())
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let entries = self.entries.read();

        let mut scored: Vec<ScoredChunk> = entries
            .values()
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query, vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.file_path.cmp(&b.chunk.file_path))
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn scroll_by_base_path(&self, base_path: &str, cap: usize) -> Result<Vec<StoredChunk>> {
        let entries = self.entries.read();

        let mut chunks: Vec<StoredChunk> = entries
            .values()
            .filter(|(chunk, _)| chunk.base_path == base_path)
            .map(|(chunk, _)| chunk.clone())
            .collect();
        chunks.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        chunks.truncate(cap);

        Ok(chunks)
    }

    async fn delete_collection(&self) -> Result<()> {
        self.entries.write().clear();
        *self.dim.lock() = None;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let count = self.entries.read().len() as u64;
        Ok(StoreStats {
            total_vectors: count,
            points_count: count,
            collection_name: self.collection.clone(),
        })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
