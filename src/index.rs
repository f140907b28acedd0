//! Repository indexing: walk the tree, detect changes, and drive parallel
//! chunk → embed → upsert into the vector store.
//!
//! Two entry points: [`Indexer::index_all`] for first-time or forced runs,
//! and [`Indexer::index_incremental`] driven by the commit delta recorded
//! in branch metadata. Per-file failures are counted, never fatal; failing
//! to open the repo root or to save metadata aborts the run.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::chunking;
use crate::embedding::EmbeddingClient;
use crate::error::{Error, Result};
use crate::filetypes;
use crate::git;
use crate::metadata::{BranchMetadata, BranchMetadataStore};
use crate::store::{self, StoredChunk, VectorStore};

/// Files above this size are skipped; they are almost always generated,
/// minified, or vendored.
const MAX_FILE_BYTES: u64 = 500_000;

/// Worker pool size: `max(3, min(8, cores / 2))`.
pub fn worker_count() -> usize {
    (num_cpus::get() / 2).clamp(3, 8)
}

/// A file queued for indexing.
#[derive(Debug, Clone)]
pub struct IndexJob {
    pub rel_path: String,
    pub content: String,
}

/// Outcome counts for one indexing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub indexed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Thread-safe counters shared across workers; the only mutable state a
/// run shares.
#[derive(Default)]
struct IndexStats {
    counts: Mutex<IndexSummary>,
}

impl IndexStats {
    fn inc_indexed(&self) -> usize {
        let mut counts = self.counts.lock();
        counts.indexed += 1;
        counts.indexed
    }

    fn inc_skipped(&self) {
        self.counts.lock().skipped += 1;
    }

    fn inc_errors(&self) {
        self.counts.lock().errors += 1;
    }

    fn snapshot(&self) -> IndexSummary {
        *self.counts.lock()
    }
}

/// Drives indexing of one repository working copy into one branch-scoped
/// vector store collection.
pub struct Indexer {
    store: Arc<dyn VectorStore>,
    embedding: Arc<dyn EmbeddingClient>,
    metadata: Arc<BranchMetadataStore>,
    repo_path: PathBuf,
    repo_name: String,
    branch: String,
    /// In-process content-hash cache; skips unchanged files on repeated
    /// full walks. Cross-restart change detection is commit-based instead.
    file_hashes: Mutex<HashMap<String, String>>,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedding: Arc<dyn EmbeddingClient>,
        metadata: Arc<BranchMetadataStore>,
        repo_path: impl Into<PathBuf>,
        repo_name: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedding,
            metadata,
            repo_path: repo_path.into(),
            repo_name: repo_name.into(),
            branch: branch.into(),
            file_hashes: Mutex::new(HashMap::new()),
        }
    }

    /// Index every indexable file in the tree, then record branch metadata.
    pub async fn index_all(&self, cancel: &CancellationToken) -> Result<IndexSummary> {
        info!(
            repo = %self.repo_name,
            branch = %self.branch,
            path = %self.repo_path.display(),
            "starting full indexing"
        );

        // The indexed branch is not necessarily the checked-out one; record
        // the commit this branch points at, not HEAD.
        let current_commit = git::branch_commit(&self.repo_path, &self.branch)?;

        let stats = IndexStats::default();
        let jobs = self.collect_jobs(&stats)?;
        self.run_workers(jobs, &stats, cancel).await;

        if cancel.is_cancelled() {
            return Err(Error::Aborted);
        }

        let summary = stats.snapshot();
        self.save_metadata(&current_commit, summary.indexed)?;

        info!(
            indexed = summary.indexed,
            skipped = summary.skipped,
            errors = summary.errors,
            "full indexing completed"
        );
        Ok(summary)
    }

    /// Re-index only files changed since the last recorded commit.
    ///
    /// With no recorded metadata this delegates to a full pass; with an
    /// unchanged head commit it is a no-op.
    pub async fn index_incremental(&self, cancel: &CancellationToken) -> Result<IndexSummary> {
        if self.repo_name.is_empty() || self.branch.is_empty() {
            return Err(Error::Config(
                "incremental indexing requires repo name and branch".to_string(),
            ));
        }

        let current_commit = git::branch_commit(&self.repo_path, &self.branch)?;

        let Some(meta) = self.metadata.load(&self.repo_name, &self.branch)? else {
            info!(
                repo = %self.repo_name,
                branch = %self.branch,
                "no metadata for branch, indexing all files"
            );
            return self.index_all(cancel).await;
        };

        if meta.commit_sha == current_commit {
            debug!(repo = %self.repo_name, branch = %self.branch, "no changes detected");
            return Ok(IndexSummary::default());
        }

        let changed = git::changed_files(&self.repo_path, &meta.commit_sha)?;
        info!(
            changed_files = changed.len(),
            from = %short(&meta.commit_sha),
            to = %short(&current_commit),
            "detected changed files"
        );

        let stats = IndexStats::default();
        let mut jobs = Vec::new();

        for rel_path in changed {
            if !filetypes::is_indexable(Path::new(&rel_path)) {
                continue;
            }

            let full_path = self.repo_path.join(&rel_path);
            let content = match std::fs::read_to_string(&full_path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // File was deleted; drop all of its chunks.
                    if let Err(e) = self.store.delete_by_base_path(&rel_path).await {
                        error!(path = %rel_path, error = %e, "failed to delete removed file");
                        stats.inc_errors();
                    } else {
                        debug!(path = %rel_path, "file removed from index");
                    }
                    continue;
                }
                Err(e) => {
                    warn!(path = %rel_path, error = %e, "failed to read changed file");
                    stats.inc_errors();
                    continue;
                }
                Ok(content) => content,
            };

            if content.len() as u64 > MAX_FILE_BYTES {
                debug!(path = %rel_path, size = content.len(), "file too large, skipping");
                stats.inc_skipped();
                continue;
            }

            // Delete first so a shrunk file leaves no stale chunks behind.
            if let Err(e) = self.store.delete_by_base_path(&rel_path).await {
                warn!(path = %rel_path, error = %e, "failed to delete old chunks before re-index");
            }

            jobs.push(IndexJob {
                rel_path,
                content,
            });
        }

        self.run_workers(jobs, &stats, cancel).await;

        if cancel.is_cancelled() {
            return Err(Error::Aborted);
        }

        let summary = stats.snapshot();
        self.save_metadata(&current_commit, summary.indexed)?;

        info!(
            indexed = summary.indexed,
            errors = summary.errors,
            commit = %short(&current_commit),
            "incremental indexing completed"
        );
        Ok(summary)
    }

    /// Walk the tree and collect jobs for every indexable, changed file.
    fn collect_jobs(&self, stats: &IndexStats) -> Result<Vec<IndexJob>> {
        if !self.repo_path.is_dir() {
            return Err(Error::NotFound(format!(
                "repository root {}",
                self.repo_path.display()
            )));
        }

        let mut jobs = Vec::new();

        let walker = WalkDir::new(&self.repo_path).into_iter().filter_entry(|e| {
            !(e.file_type().is_dir()
                && filetypes::is_skip_dir(&e.file_name().to_string_lossy()))
        });

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !filetypes::is_indexable(path) {
                continue;
            }

            if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(false) {
                debug!(path = %path.display(), "file too large, skipping");
                stats.inc_skipped();
                continue;
            }

            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read file");
                    continue;
                }
            };

            if content.trim().is_empty() {
                continue;
            }

            let rel_path = path
                .strip_prefix(&self.repo_path)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();

            let current_hash = chunking::hash_content(&content);
            {
                let mut hashes = self.file_hashes.lock();
                if hashes.get(&rel_path) == Some(&current_hash) {
                    stats.inc_skipped();
                    continue;
                }
                hashes.insert(rel_path.clone(), current_hash);
            }

            jobs.push(IndexJob { rel_path, content });
        }

        Ok(jobs)
    }

    /// Drain jobs through the worker pool. Workers stop pulling new jobs
    /// once the cancellation token fires; in-flight files finish on their
    /// own deadlines.
    async fn run_workers(&self, jobs: Vec<IndexJob>, stats: &IndexStats, cancel: &CancellationToken) {
        if jobs.is_empty() {
            return;
        }

        let workers = worker_count();
        info!(files = jobs.len(), workers, "starting parallel indexing");

        let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
        let shared_stats = Arc::new(IndexStats::default());
        let mut set: JoinSet<()> = JoinSet::new();

        for worker_id in 0..workers {
            let queue = Arc::clone(&queue);
            let shared_stats = Arc::clone(&shared_stats);
            let cancel = cancel.clone();
            let store = Arc::clone(&self.store);
            let embedding = Arc::clone(&self.embedding);

            set.spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some(job) = queue.lock().pop_front() else {
                        break;
                    };

                    match index_file(store.as_ref(), embedding.as_ref(), &job).await {
                        Ok(()) => {
                            let indexed = shared_stats.inc_indexed();
                            if indexed % 10 == 0 {
                                debug!(indexed, worker = worker_id, "indexing progress");
                            }
                        }
                        Err(e) => {
                            error!(
                                worker = worker_id,
                                path = %job.rel_path,
                                error = %e,
                                "failed to index file"
                            );
                            shared_stats.inc_errors();
                        }
                    }
                }
            });
        }

        while set.join_next().await.is_some() {}

        let worker_summary = shared_stats.snapshot();
        let mut counts = stats.counts.lock();
        counts.indexed += worker_summary.indexed;
        counts.errors += worker_summary.errors;
    }

    fn save_metadata(&self, commit_sha: &str, file_count: usize) -> Result<()> {
        self.metadata.save(&BranchMetadata {
            repo_name: self.repo_name.clone(),
            branch: self.branch.clone(),
            commit_sha: commit_sha.to_string(),
            indexed_at: Utc::now(),
            file_count,
        })
    }
}

/// Chunk one file and embed + upsert each chunk. An error on any chunk
/// fails the whole file.
async fn index_file(
    store: &dyn VectorStore,
    embedding: &dyn EmbeddingClient,
    job: &IndexJob,
) -> Result<()> {
    let language = filetypes::language_of(Path::new(&job.rel_path));
    let chunks = chunking::chunk_file(&job.rel_path, &job.content, language);
    let chunk_count = chunks.len();

    if chunk_count > 1 {
        debug!(
            path = %job.rel_path,
            size = job.content.len(),
            chunks = chunk_count,
            "file chunked for token budget"
        );
    }

    for chunk in chunks {
        let file_path = store::chunk_file_path(&chunk.base_path, chunk.chunk_index, chunk_count);
        let vector = embedding.embed(&chunk.content).await?;

        store
            .upsert(
                StoredChunk {
                    file_path,
                    base_path: chunk.base_path,
                    content: chunk.content,
                    language: chunk.language,
                    file_hash: chunk.file_hash,
                    chunk_index: chunk.chunk_index,
                },
                vector,
            )
            .await?;
    }

    Ok(())
}

fn short(sha: &str) -> &str {
    &sha[..sha.len().min(8)]
}
