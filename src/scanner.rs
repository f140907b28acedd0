//! Periodic branch scanner: watches every configured repository for commit
//! drift on branches that have been indexed before, and triggers
//! incremental re-indexing through the owning coordinator.
//!
//! Branches only become "known" once a first index run has written their
//! metadata, so the scanner never initiates first-time indexing on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::coordinator::RepoCoordinator;
use crate::git;
use crate::metadata::BranchMetadataStore;

const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(10);

pub struct BranchScanner {
    coordinators: Vec<Arc<RepoCoordinator>>,
    metadata: Arc<BranchMetadataStore>,
    interval: Duration,
}

impl BranchScanner {
    pub fn new(
        coordinators: Vec<Arc<RepoCoordinator>>,
        metadata: Arc<BranchMetadataStore>,
        interval: Duration,
    ) -> Self {
        let interval = if interval.is_zero() {
            DEFAULT_SCAN_INTERVAL
        } else {
            interval
        };

        Self {
            coordinators,
            metadata,
            interval,
        }
    }

    /// Run the scan loop until cancelled. The first scan happens
    /// immediately; cancellation is honored between ticks and never
    /// interrupts a scan in progress.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "branch scanner started");

        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.scan_all().await,
                _ = cancel.cancelled() => {
                    info!("branch scanner stopped");
                    return;
                }
            }
        }
    }

    /// One scan pass over every configured repository.
    pub async fn scan_all(&self) {
        debug!("starting periodic branch scan");
        for coordinator in &self.coordinators {
            self.scan_repo(coordinator).await;
        }
    }

    async fn scan_repo(&self, coordinator: &RepoCoordinator) {
        let repo = coordinator.repo_name();

        if !git::is_repo(coordinator.repo_path()) {
            debug!(repo, "not a git repository, skipping");
            return;
        }

        let known_branches = self.metadata.known_branches(repo);
        if known_branches.is_empty() {
            debug!(repo, "no known branches to scan yet");
            return;
        }

        debug!(repo, branches = known_branches.len(), "scanning known branches");
        for branch in known_branches {
            self.check_branch(coordinator, &branch).await;
        }
    }

    /// Compare a branch's commit with the recorded one and re-index on
    /// drift. Every failure here is logged and the loop moves on.
    async fn check_branch(&self, coordinator: &RepoCoordinator, branch: &str) {
        let repo = coordinator.repo_name();

        let current = match git::branch_commit(coordinator.repo_path(), branch) {
            Ok(commit) => commit,
            Err(e) => {
                warn!(repo, branch, error = %e, "failed to resolve branch commit");
                return;
            }
        };

        let meta = match self.metadata.load(repo, branch) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(repo, branch, error = %e, "skipping branch with unreadable metadata");
                return;
            }
        };

        let Some(meta) = meta else {
            // Known-branch listing raced with a metadata removal; nothing
            // to compare against.
            return;
        };

        if meta.commit_sha == current {
            debug!(repo, branch, "no changes detected");
            return;
        }

        info!(
            repo,
            branch,
            old_commit = short(&meta.commit_sha),
            new_commit = short(&current),
            "branch has changes, triggering re-index"
        );

        match coordinator.reindex(branch).await {
            Ok(summary) => info!(
                repo,
                branch,
                indexed = summary.indexed,
                errors = summary.errors,
                "re-index completed"
            ),
            Err(e) => error!(repo, branch, error = %e, "re-index failed"),
        }
    }
}

fn short(sha: &str) -> &str {
    &sha[..sha.len().min(8)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoEntry;
    use crate::embedding::EmbeddingClient;
    use crate::error::Result;
    use crate::retrieve::RetrievalConfig;
    use crate::store::StoreConfig;
    use git2::{Repository, Signature};
    use sha2::Digest;
    use std::fs;
    use std::path::Path;

    struct MockEmbedding;

    #[async_trait::async_trait]
    impl EmbeddingClient for MockEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let digest = sha2::Sha256::digest(text.as_bytes());
            Ok(digest.iter().take(4).map(|b| *b as f32 / 255.0).collect())
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    fn commit_file(repo: &Repository, rel_path: &str, content: &str) {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join(rel_path), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(rel_path)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("tester", "tester@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, "commit", &tree, &parents)
            .unwrap();
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        _state: tempfile::TempDir,
        repo: Repository,
        coordinator: Arc<RepoCoordinator>,
        metadata: Arc<BranchMetadataStore>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        fs::create_dir_all(&repo_path).unwrap();
        let repo = Repository::init_opts(
            &repo_path,
            git2::RepositoryInitOptions::new().initial_head("main"),
        )
        .unwrap();
        let state = tempfile::tempdir().unwrap();
        let metadata = Arc::new(BranchMetadataStore::new(state.path()));

        let coordinator = Arc::new(
            RepoCoordinator::new(
                RepoEntry {
                    name: "test".to_string(),
                    path: repo_path,
                    focus_paths: Vec::new(),
                    exclude_patterns: Vec::new(),
                },
                StoreConfig::Memory,
                Arc::new(MockEmbedding),
                Arc::clone(&metadata),
                RetrievalConfig::default(),
                CancellationToken::new(),
            )
            .unwrap(),
        );

        Fixture {
            _dir: dir,
            _state: state,
            repo,
            coordinator,
            metadata,
        }
    }

    fn scanner(fx: &Fixture) -> BranchScanner {
        BranchScanner::new(
            vec![Arc::clone(&fx.coordinator)],
            Arc::clone(&fx.metadata),
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_scan_skips_unknown_branches() {
        let fx = fixture();
        commit_file(&fx.repo, "a.go", "package a\n");

        // No branch has been indexed, so a scan must not index anything.
        scanner(&fx).scan_all().await;

        let branch = fx.coordinator.current_branch();
        assert!(fx.metadata.load("test", &branch).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_reindexes_on_commit_drift() {
        let fx = fixture();
        commit_file(&fx.repo, "a.go", "package a\n");

        // First index initiated externally makes the branch known.
        let branch = fx.coordinator.current_branch();
        fx.coordinator.reindex(&branch).await.unwrap();
        let before = fx.metadata.load("test", &branch).unwrap().unwrap();

        commit_file(&fx.repo, "b.go", "package b\n");
        scanner(&fx).scan_all().await;

        let after = fx.metadata.load("test", &branch).unwrap().unwrap();
        assert_ne!(before.commit_sha, after.commit_sha);
    }

    #[tokio::test]
    async fn test_scan_noop_when_commit_unchanged() {
        let fx = fixture();
        commit_file(&fx.repo, "a.go", "package a\n");

        let branch = fx.coordinator.current_branch();
        fx.coordinator.reindex(&branch).await.unwrap();
        let before = fx.metadata.load("test", &branch).unwrap().unwrap();

        scanner(&fx).scan_all().await;

        let after = fx.metadata.load("test", &branch).unwrap().unwrap();
        assert_eq!(before.commit_sha, after.commit_sha);
        assert_eq!(before.indexed_at, after.indexed_at);
    }

    #[tokio::test]
    async fn test_scan_skips_non_git_directories() {
        let dir = tempfile::tempdir().unwrap();
        let state = tempfile::tempdir().unwrap();
        let metadata = Arc::new(BranchMetadataStore::new(state.path()));

        let coordinator = Arc::new(
            RepoCoordinator::new(
                RepoEntry {
                    name: "plain".to_string(),
                    path: dir.path().to_path_buf(),
                    focus_paths: Vec::new(),
                    exclude_patterns: Vec::new(),
                },
                StoreConfig::Memory,
                Arc::new(MockEmbedding),
                Arc::clone(&metadata),
                RetrievalConfig::default(),
                CancellationToken::new(),
            )
            .unwrap(),
        );

        let scanner = BranchScanner::new(
            vec![coordinator],
            metadata,
            Duration::from_secs(10),
        );
        // Must simply not panic or index anything.
        scanner.scan_all().await;
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let fx = fixture();
        commit_file(&fx.repo, "a.go", "package a\n");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scanner(&fx).run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scanner should stop after cancellation")
            .unwrap();
    }

    #[test]
    fn test_zero_interval_uses_default() {
        let state = tempfile::tempdir().unwrap();
        let scanner = BranchScanner::new(
            Vec::new(),
            Arc::new(BranchMetadataStore::new(state.path())),
            Duration::ZERO,
        );
        assert_eq!(scanner.interval, DEFAULT_SCAN_INTERVAL);
    }
}
