use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::models::{ReindexRequest, ReindexResponse, RepoInfo, StatsResponse};
use crate::state::AppState;

/// GET /api/repos - List configured repositories with their current branch.
pub async fn list_repos(State(state): State<AppState>) -> Json<Vec<RepoInfo>> {
    let repos = state
        .coordinators()
        .iter()
        .map(|c| RepoInfo {
            name: c.repo_name().to_string(),
            path: c.repo_path().display().to_string(),
            branch: c.current_branch(),
        })
        .collect();

    Json(repos)
}

/// POST /api/repos/{name}/reindex - Incrementally re-index a branch.
/// Defaults to the working copy's current branch.
pub async fn reindex_repo(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<ReindexRequest>,
) -> Result<Json<ReindexResponse>, (StatusCode, String)> {
    let coordinator = state
        .coordinator(&name)
        .ok_or((StatusCode::NOT_FOUND, format!("repository not found: {name}")))?;

    let branch = req
        .branch
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| coordinator.current_branch());

    let summary = coordinator
        .reindex(&branch)
        .await
        .map_err(super::error_response)?;

    Ok(Json(ReindexResponse {
        repo: name,
        branch,
        indexed: summary.indexed,
        skipped: summary.skipped,
        errors: summary.errors,
    }))
}

/// GET /api/repos/{name}/stats - Vector store stats for the current branch.
pub async fn repo_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StatsResponse>, (StatusCode, String)> {
    let coordinator = state
        .coordinator(&name)
        .ok_or((StatusCode::NOT_FOUND, format!("repository not found: {name}")))?;

    let stats = coordinator.stats().await.map_err(super::error_response)?;

    Ok(Json(StatsResponse {
        collection_name: stats.collection_name,
        total_vectors: stats.total_vectors,
        points_count: stats.points_count,
    }))
}
