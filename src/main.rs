use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use mesh::api;
use mesh::config::Config;
use mesh::scanner::BranchScanner;
use mesh::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("State directory: {}", config.state_root.display());
    tracing::info!("Repositories configured: {}", config.repos.len());

    let cancel = CancellationToken::new();
    let state = AppState::new(config.clone(), cancel.clone())?;

    // First-time / catch-up indexing for every repo that is a git working
    // copy. Failures are logged and the service continues; answers will
    // simply see whatever the store currently holds.
    for coordinator in state.coordinators() {
        if !mesh::git::is_repo(coordinator.repo_path()) {
            tracing::warn!(
                repo = coordinator.repo_name(),
                "not a git repository, skipping initial indexing"
            );
            continue;
        }
        let branch = coordinator.current_branch();
        match coordinator.reindex(&branch).await {
            Ok(summary) => tracing::info!(
                repo = coordinator.repo_name(),
                branch = %branch,
                indexed = summary.indexed,
                errors = summary.errors,
                "initial indexing complete"
            ),
            Err(e) => tracing::warn!(
                repo = coordinator.repo_name(),
                branch = %branch,
                error = %e,
                "initial indexing failed, continuing"
            ),
        }
    }

    let scanner = BranchScanner::new(
        state.coordinators(),
        state.metadata.clone(),
        Duration::from_secs(config.scan_interval_secs),
    );
    tokio::spawn(scanner.run(cancel.clone()));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    let app = Router::new()
        .route("/api/repos", get(api::repos::list_repos))
        .route("/api/answer", post(api::answer::answer_all))
        .route("/api/repos/{name}/answer", post(api::answer::answer))
        .route("/api/repos/{name}/search", post(api::answer::search))
        .route("/api/repos/{name}/reindex", post(api::repos::reindex_repo))
        .route("/api/repos/{name}/stats", get(api::repos::repo_stats))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    let serve_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_cancel.cancelled().await })
        .await?;

    Ok(())
}
