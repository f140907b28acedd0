//! Per-repository composition: one coordinator exclusively owns the
//! branch-scoped vector store handles, the retrieval configuration, and
//! the indexer constructors for a single working copy. Callers hold a
//! handle to the coordinator only.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::RepoEntry;
use crate::embedding::EmbeddingClient;
use crate::error::Result;
use crate::git;
use crate::index::{IndexSummary, Indexer};
use crate::metadata::BranchMetadataStore;
use crate::models::ContextFile;
use crate::retrieve::{RetrievalConfig, Retriever};
use crate::store::{StoreConfig, VectorStore};

/// Branch assumed when the working copy is not a git repository.
const DEFAULT_BRANCH: &str = "main";

pub struct RepoCoordinator {
    repo: RepoEntry,
    store_config: StoreConfig,
    embedding: Arc<dyn EmbeddingClient>,
    metadata: Arc<BranchMetadataStore>,
    retrieval: RetrievalConfig,
    cancel: CancellationToken,

    /// One live store handle per branch. The scanner re-indexes every
    /// known branch, not just the checked-out one, so each branch keeps
    /// its own handle for the coordinator's lifetime.
    stores: RwLock<HashMap<String, Arc<dyn VectorStore>>>,
    /// Serializes reindex runs per branch without blocking answers.
    reindex_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RepoCoordinator {
    pub fn new(
        repo: RepoEntry,
        store_config: StoreConfig,
        embedding: Arc<dyn EmbeddingClient>,
        metadata: Arc<BranchMetadataStore>,
        retrieval: RetrievalConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        retrieval.validate()?;
        Ok(Self {
            repo,
            store_config,
            embedding,
            metadata,
            retrieval,
            cancel,
            stores: RwLock::new(HashMap::new()),
            reindex_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn repo_name(&self) -> &str {
        &self.repo.name
    }

    pub fn repo_path(&self) -> &std::path::Path {
        &self.repo.path
    }

    /// The working copy's checked-out branch, or the default when this is
    /// not a git repository.
    pub fn current_branch(&self) -> String {
        if git::is_repo(&self.repo.path) {
            if let Ok(branch) = git::current_branch(&self.repo.path) {
                if !branch.is_empty() {
                    return branch;
                }
            }
        }
        DEFAULT_BRANCH.to_string()
    }

    /// Retrieve context for a question against the current branch.
    ///
    /// Runs the retriever only; forwarding the context to an LLM is the
    /// caller's business. Focus paths and exclude patterns configured for
    /// the repo are applied to the result here, after retrieval.
    pub async fn answer(&self, question: &str) -> Result<Vec<ContextFile>> {
        let store = self.store_for_current().await?;
        let retriever = Retriever::new(store, Arc::clone(&self.embedding), self.retrieval.clone())?;

        let mut files = retriever.retrieve(question).await?;

        if !self.repo.focus_paths.is_empty() {
            files.retain(|f| self.repo.focus_paths.iter().any(|p| f.path.starts_with(p)));
        }
        if !self.repo.exclude_patterns.is_empty() {
            files.retain(|f| !self.repo.exclude_patterns.iter().any(|p| f.path.contains(p)));
        }

        Ok(files)
    }

    /// Raw chunk-level search against the current branch, for callers that
    /// want hits rather than reconstructed files.
    pub async fn search_chunks(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<crate::store::ScoredChunk>> {
        let store = self.store_for_current().await?;
        let query_vector = self.embedding.embed(query).await?;
        store.search(&query_vector, limit).await
    }

    /// Incrementally re-index one branch. Concurrent calls for the same
    /// branch serialize; answers keep reading the store's current state.
    pub async fn reindex(&self, branch: &str) -> Result<IndexSummary> {
        let lock = self.branch_lock(branch);
        let _guard = lock.lock().await;

        info!(repo = %self.repo.name, branch, "triggering incremental re-index");

        let store = self.store_for(branch).await?;
        let indexer = Indexer::new(
            store,
            Arc::clone(&self.embedding),
            Arc::clone(&self.metadata),
            &self.repo.path,
            &self.repo.name,
            branch,
        );

        indexer.index_incremental(&self.cancel).await
    }

    /// Stats for the current branch's collection.
    pub async fn stats(&self) -> Result<crate::store::StoreStats> {
        let store = self.store_for_current().await?;
        store.stats().await
    }

    async fn store_for_current(&self) -> Result<Arc<dyn VectorStore>> {
        let branch = self.current_branch();
        self.store_for(&branch).await
    }

    /// The store handle for a branch, opened once and cached. Two tasks
    /// racing on a branch seen for the first time may both open a handle;
    /// whichever lands in the cache first wins and the other is dropped
    /// before any writes go through it.
    async fn store_for(&self, branch: &str) -> Result<Arc<dyn VectorStore>> {
        if let Some(store) = self.stores.read().get(branch) {
            return Ok(Arc::clone(store));
        }

        let store = self.store_config.open(&self.repo.name, branch)?;
        store.ensure_collection(self.embedding.dimensions()).await?;

        let mut stores = self.stores.write();
        let cached = stores.entry(branch.to_string()).or_insert(store);
        Ok(Arc::clone(cached))
    }

    fn branch_lock(&self, branch: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.reindex_locks.lock();
        Arc::clone(
            locks
                .entry(branch.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}
