use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::coordinator::RepoCoordinator;
use crate::metadata::BranchMetadataStore;

/// Shared application state: one coordinator per configured repository.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub metadata: Arc<BranchMetadataStore>,
    pub cancel: CancellationToken,
    coordinators: Arc<HashMap<String, Arc<RepoCoordinator>>>,
}

impl AppState {
    pub fn new(config: Config, cancel: CancellationToken) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.state_root)?;

        let embedding = config.embedding.build()?;
        let metadata = Arc::new(BranchMetadataStore::new(&config.state_root));
        let store_config = config.store_config();

        let mut coordinators = HashMap::new();
        for repo in &config.repos {
            let coordinator = RepoCoordinator::new(
                repo.clone(),
                store_config.clone(),
                Arc::clone(&embedding),
                Arc::clone(&metadata),
                config.retrieval.clone(),
                cancel.clone(),
            )?;
            coordinators.insert(repo.name.clone(), Arc::new(coordinator));
        }

        Ok(Self {
            config,
            metadata,
            cancel,
            coordinators: Arc::new(coordinators),
        })
    }

    pub fn coordinator(&self, repo_name: &str) -> Option<Arc<RepoCoordinator>> {
        self.coordinators.get(repo_name).cloned()
    }

    pub fn coordinators(&self) -> Vec<Arc<RepoCoordinator>> {
        let mut all: Vec<_> = self.coordinators.values().cloned().collect();
        all.sort_by(|a, b| a.repo_name().cmp(b.repo_name()));
        all
    }
}
