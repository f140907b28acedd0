//! Qdrant-backed vector store. One cosine HNSW collection per
//! `{repo, branch}` pair.

use std::collections::HashMap;

use qdrant_client::qdrant::{
    vectors_config, Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    HnswConfigDiffBuilder, PointStruct, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info, warn};

use super::{ScoredChunk, StoreStats, StoredChunk, VectorStore};
use crate::error::{Error, Result};

/// HNSW build parameters tuned for code retrieval: M=16 balances recall and
/// speed, ef_construct=128 trades build time for index quality.
const HNSW_M: u64 = 16;
const HNSW_EF_CONSTRUCT: u64 = 128;

pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl QdrantStore {
    /// Connect to a Qdrant server and bind to one branch-scoped collection.
    pub fn connect(url: &str, collection: String) -> Result<Self> {
        if url.is_empty() {
            return Err(Error::Config("qdrant url is required".to_string()));
        }

        let client = Qdrant::from_url(url).skip_compatibility_check().build()?;
        info!(collection = %collection, url, "qdrant store initialized");

        Ok(Self { client, collection })
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, dim: usize) -> Result<()> {
        if self.client.collection_exists(&self.collection).await? {
            let info = self.client.collection_info(&self.collection).await?;
            let existing = info
                .result
                .and_then(|r| r.config)
                .and_then(|c| c.params)
                .and_then(|p| p.vectors_config)
                .and_then(|v| v.config)
                .and_then(|c| match c {
                    vectors_config::Config::Params(p) => Some(p.size as usize),
                    _ => None,
                });

            if let Some(existing) = existing {
                if existing != dim {
                    return Err(Error::Config(format!(
                        "collection {} has dimension {existing}, embedding model produces {dim}",
                        self.collection
                    )));
                }
            }

            debug!(collection = %self.collection, "collection already exists");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dim as u64, Distance::Cosine))
                    .hnsw_config(
                        HnswConfigDiffBuilder::default()
                            .m(HNSW_M)
                            .ef_construct(HNSW_EF_CONSTRUCT),
                    ),
            )
            .await?;

        info!(collection = %self.collection, dim, "collection created");
        Ok(())
    }

    async fn upsert(&self, chunk: StoredChunk, vector: Vec<f32>) -> Result<()> {
        let id = super::point_id_for(&chunk.file_path);
        let point = PointStruct::new(id, vector, to_payload(&chunk));

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]))
            .await?;

        debug!(file_path = %chunk.file_path, "chunk upserted");
        Ok(())
    }

    async fn delete_by_base_path(&self, base_path: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection).points(Filter::must([
                    Condition::matches("base_path", base_path.to_string()),
                ])),
            )
            .await?;

        debug!(base_path, "chunks deleted");
        Ok(())
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await?;

        let mut hits = Vec::with_capacity(response.result.len());
        for point in response.result {
            match from_payload(&point.payload) {
                Some(chunk) => hits.push(ScoredChunk {
                    chunk,
                    score: point.score,
                }),
                None => warn!(collection = %self.collection, "dropping point with incomplete payload"),
            }
        }

        Ok(hits)
    }

    async fn scroll_by_base_path(&self, base_path: &str, cap: usize) -> Result<Vec<StoredChunk>> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.collection)
                    .filter(Filter::must([Condition::matches(
                        "base_path",
                        base_path.to_string(),
                    )]))
                    .limit(cap as u32)
                    .with_payload(true),
            )
            .await?;

        let mut chunks = Vec::with_capacity(response.result.len());
        for point in response.result {
            match from_payload(&point.payload) {
                Some(chunk) => chunks.push(chunk),
                None => warn!(base_path, "dropping point with incomplete payload"),
            }
        }

        Ok(chunks)
    }

    async fn delete_collection(&self) -> Result<()> {
        self.client.delete_collection(&self.collection).await?;
        info!(collection = %self.collection, "collection deleted");
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let info = self.client.collection_info(&self.collection).await?;
        let result = info.result.unwrap_or_default();

        Ok(StoreStats {
            total_vectors: result.indexed_vectors_count.unwrap_or(0),
            points_count: result.points_count.unwrap_or(0),
            collection_name: self.collection.clone(),
        })
    }

    async fn close(&self) -> Result<()> {
        // The gRPC channel is dropped with the client.
        Ok(())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}

fn to_payload(chunk: &StoredChunk) -> HashMap<String, Value> {
    HashMap::from([
        ("file_path".to_string(), Value::from(chunk.file_path.clone())),
        ("base_path".to_string(), Value::from(chunk.base_path.clone())),
        ("content".to_string(), Value::from(chunk.content.clone())),
        ("file_hash".to_string(), Value::from(chunk.file_hash.clone())),
        ("language".to_string(), Value::from(chunk.language.clone())),
        ("chunk_index".to_string(), Value::from(chunk.chunk_index as i64)),
    ])
}

/// Rebuild a [`StoredChunk`] from a point payload. Returns `None` when any
/// required field is missing, so callers can skip corrupt records.
fn from_payload(payload: &HashMap<String, Value>) -> Option<StoredChunk> {
    let file_path = get_string(payload, "file_path")?;
    let base_path = get_string(payload, "base_path")?;
    let content = get_string(payload, "content")?;

    Some(StoredChunk {
        file_path,
        base_path,
        content,
        language: get_string(payload, "language").unwrap_or_else(|| "text".to_string()),
        file_hash: get_string(payload, "file_hash").unwrap_or_default(),
        chunk_index: get_integer(payload, "chunk_index").unwrap_or(0) as usize,
    })
}

fn get_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    })
}

fn get_integer(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(qdrant_client::qdrant::value::Kind::IntegerValue(i)) => Some(*i),
        _ => None,
    })
}
