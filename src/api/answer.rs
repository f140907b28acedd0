use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tokio::task::JoinSet;

use crate::models::{
    AnswerAllResponse, AnswerRequest, AnswerResponse, SearchHit, SearchRequest, SearchResponse,
};
use crate::state::AppState;

/// POST /api/repos/{name}/answer - Retrieve context for a question.
///
/// Returns the ranked, reconstructed files; forwarding them to an LLM is
/// the caller's job.
pub async fn answer(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, (StatusCode, String)> {
    let question = req.question.trim().to_string();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question is required".to_string()));
    }

    let coordinator = state
        .coordinator(&name)
        .ok_or((StatusCode::NOT_FOUND, format!("repository not found: {name}")))?;

    let files = coordinator
        .answer(&question)
        .await
        .map_err(super::error_response)?;

    Ok(Json(AnswerResponse { question, files }))
}

/// POST /api/answer - Retrieve context from every configured repository.
///
/// Repos are queried concurrently and results stay keyed by repo name;
/// nothing is merged across repositories. Per-repo failures land in the
/// `errors` map instead of failing the request.
pub async fn answer_all(
    State(state): State<AppState>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerAllResponse>, (StatusCode, String)> {
    let question = req.question.trim().to_string();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question is required".to_string()));
    }

    let mut set = JoinSet::new();
    for coordinator in state.coordinators() {
        let question = question.clone();
        set.spawn(async move {
            let name = coordinator.repo_name().to_string();
            let result = coordinator.answer(&question).await;
            (name, result)
        });
    }

    let mut repos = HashMap::new();
    let mut errors = HashMap::new();
    while let Some(joined) = set.join_next().await {
        let Ok((name, result)) = joined else { continue };
        match result {
            Ok(files) => {
                repos.insert(name, files);
            }
            Err(e) => {
                errors.insert(name, e.to_string());
            }
        }
    }

    Ok(Json(AnswerAllResponse {
        question,
        repos,
        errors,
    }))
}

/// POST /api/repos/{name}/search - Raw chunk-level vector search.
pub async fn search(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let query = req.query.trim().to_string();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "query is required".to_string()));
    }
    let limit = req.limit.clamp(1, 100);

    let coordinator = state
        .coordinator(&name)
        .ok_or((StatusCode::NOT_FOUND, format!("repository not found: {name}")))?;

    let hits = coordinator
        .search_chunks(&query, limit)
        .await
        .map_err(super::error_response)?;

    let results = hits
        .into_iter()
        .map(|hit| SearchHit {
            file_path: hit.chunk.file_path,
            base_path: hit.chunk.base_path,
            language: hit.chunk.language,
            content: hit.chunk.content,
            score: hit.score,
        })
        .collect();

    Ok(Json(SearchResponse { query, results }))
}
