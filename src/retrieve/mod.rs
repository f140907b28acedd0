//! Query-time retrieval: vector search, file-level candidate building,
//! adaptive thresholding, hybrid scoring, token-budgeted selection, and
//! file reconstruction.

pub mod config;
pub mod scoring;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chunking::estimate_tokens;
use crate::embedding::EmbeddingClient;
use crate::error::Result;
use crate::models::ContextFile;
use crate::store::{extract_base_path, ScoredChunk, VectorStore, SCROLL_CAP};

pub use config::RetrievalConfig;
use scoring::{aggregate_score, extract_keywords, keyword_score, path_score};
use scoring::{FileCandidate, FileSelection};

/// Mean keyword score below which the keyword signal is considered noise
/// and its weight is shifted onto the semantic signal for the query.
const WEAK_KEYWORD_MEAN: f32 = 0.05;

/// Turns a question into a bounded, ranked set of reconstructed files.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedding: Arc<dyn EmbeddingClient>,
    config: RetrievalConfig,
}

impl Retriever {
    /// Validates the config; an invalid one never constructs a retriever.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedding: Arc<dyn EmbeddingClient>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            embedding,
            config,
        })
    }

    /// Run the full retrieval pipeline for one question.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ContextFile>> {
        let query_vector = self.embedding.embed(question).await?;
        let raw = self
            .store
            .search(&query_vector, self.config.initial_chunk_limit)
            .await?;

        if raw.is_empty() {
            warn!("vector search returned no results");
            return Ok(Vec::new());
        }

        let keywords = extract_keywords(question);
        debug!(keywords = ?keywords, raw_chunks = raw.len(), "search results in hand");

        let mut candidates = self.build_candidates(&raw, &keywords).await;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let threshold = self.adaptive_threshold(&candidates);
        candidates.retain(|c| c.best_chunk_score >= threshold);
        if candidates.is_empty() {
            debug!(threshold = %threshold, "no candidates passed the adaptive threshold");
            return Ok(Vec::new());
        }

        self.apply_hybrid_scoring(&mut candidates, &keywords);
        let selections = self.select_within_budget(candidates);
        let results = self.reconstruct(&selections).await;

        info!(
            files = results.len(),
            "retrieval completed"
        );
        Ok(results)
    }

    /// Group raw chunk hits by their originating file and attach every
    /// scoring signal. A candidate whose full content cannot be fetched is
    /// dropped, not fatal.
    async fn build_candidates(
        &self,
        raw: &[ScoredChunk],
        keywords: &[String],
    ) -> Vec<FileCandidate> {
        let mut grouped: HashMap<String, FileCandidate> = HashMap::new();

        for hit in raw {
            let base_path = extract_base_path(&hit.chunk.file_path).to_string();
            let tokens = estimate_tokens(&hit.chunk.content);

            let candidate = grouped.entry(base_path.clone()).or_insert(FileCandidate {
                base_path,
                language: hit.chunk.language.clone(),
                best_chunk_score: 0.0,
                top_chunk_scores: Vec::new(),
                chunk_count: 0,
                keyword_score: 0.0,
                path_score: 0.0,
                hybrid_score: 0.0,
                estimated_tokens: 0,
            });

            candidate.chunk_count += 1;
            candidate.estimated_tokens += tokens;
            candidate.best_chunk_score = candidate.best_chunk_score.max(hit.score);

            candidate.top_chunk_scores.push(hit.score);
            candidate
                .top_chunk_scores
                .sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
            candidate.top_chunk_scores.truncate(3);
        }

        let mut candidates = Vec::with_capacity(grouped.len());
        for (base_path, mut candidate) in grouped {
            let chunks = match self.store.scroll_by_base_path(&base_path, SCROLL_CAP).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(file = %base_path, error = %e, "failed to fetch chunks for scoring");
                    continue;
                }
            };

            let full_content = chunks
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>()
                .join("\n");

            candidate.keyword_score = keyword_score(&full_content, keywords);
            candidate.path_score = path_score(&candidate.base_path, keywords);
            candidates.push(candidate);
        }

        candidates
    }

    /// Distribution-based threshold with an absolute floor and a
    /// min-survivors guard that relaxes it when too few files pass.
    fn adaptive_threshold(&self, candidates: &[FileCandidate]) -> f32 {
        let config = &self.config;
        if candidates.is_empty() {
            return config.min_absolute_score;
        }

        let mut scores: Vec<f32> = candidates.iter().map(|c| c.best_chunk_score).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let percentile_idx = ((scores.len() as f32 * config.score_distribution_percentile)
            as usize)
            .min(scores.len() - 1);
        let distribution_threshold = scores[percentile_idx];

        let mut threshold = distribution_threshold.max(config.min_absolute_score);

        let survivors = scores.iter().filter(|s| **s >= threshold).count();
        if survivors < config.min_files_after_threshold
            && scores.len() >= config.min_files_after_threshold
        {
            let relaxed = scores[scores.len() - config.min_files_after_threshold];
            info!(
                original_threshold = %threshold,
                relaxed_threshold = %relaxed,
                min_files = config.min_files_after_threshold,
                "relaxed threshold to keep minimum survivors"
            );
            threshold = relaxed;
        }

        debug!(
            distribution_threshold = %distribution_threshold,
            threshold = %threshold,
            candidates = candidates.len(),
            "adaptive threshold computed"
        );
        threshold
    }

    /// Weighted hybrid scores with dynamic re-weighting when keywords carry
    /// no signal, plus penalties for files that are rarely what a code
    /// question is about.
    fn apply_hybrid_scoring(&self, candidates: &mut [FileCandidate], keywords: &[String]) {
        let config = &self.config;

        let mean_keyword = if candidates.is_empty() {
            0.0
        } else {
            candidates.iter().map(|c| c.keyword_score).sum::<f32>() / candidates.len() as f32
        };

        let mut semantic_weight = config.semantic_weight;
        let mut keyword_weight = config.keyword_weight;

        if keywords.is_empty() || mean_keyword < WEAK_KEYWORD_MEAN {
            semantic_weight += keyword_weight;
            keyword_weight = 0.0;
            debug!(
                keyword_count = keywords.len(),
                mean_keyword = %mean_keyword,
                "keywords carry no signal, scoring semantic-only"
            );
        }

        for candidate in candidates.iter_mut() {
            let aggregate = aggregate_score(&candidate.top_chunk_scores);

            candidate.hybrid_score = candidate.best_chunk_score * semantic_weight
                + candidate.keyword_score * keyword_weight
                + candidate.path_score * config.path_weight
                + aggregate * config.aggregate_weight;

            let base_lower = candidate.base_path.to_lowercase();

            if base_lower.contains(".github/workflows")
                || base_lower.contains("bitbucket-pipelines")
                || base_lower.ends_with(".gitlab-ci.yml")
            {
                candidate.hybrid_score *= 0.50;
                debug!(file = %candidate.base_path, "workflow file penalty");
            }

            if base_lower.ends_with(".md") && candidate.estimated_tokens > 10_000 {
                candidate.hybrid_score *= 0.70;
                debug!(file = %candidate.base_path, "large markdown penalty");
            }

            if base_lower.contains("package-lock.json") || base_lower.contains("yarn.lock") {
                candidate.hybrid_score *= 0.40;
                debug!(file = %candidate.base_path, "lockfile penalty");
            }
        }
    }

    /// Take files best-first until the token budget or file limit runs out.
    /// A file that doesn't fit whole may still contribute its top chunks.
    fn select_within_budget(&self, mut candidates: Vec<FileCandidate>) -> Vec<FileSelection> {
        let config = &self.config;

        candidates.sort_by(|a, b| {
            b.hybrid_score
                .partial_cmp(&a.hybrid_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.base_path.cmp(&b.base_path))
        });

        let mut selected = Vec::new();
        let mut remaining = config.effective_token_budget();

        for candidate in candidates {
            if selected.len() >= config.max_files_limit {
                debug!(max_files = config.max_files_limit, "file limit reached");
                break;
            }

            if candidate.estimated_tokens <= remaining {
                remaining -= candidate.estimated_tokens;
                selected.push(FileSelection {
                    base_path: candidate.base_path,
                    language: candidate.language,
                    score: candidate.hybrid_score,
                    is_partial: false,
                    estimated_tokens: candidate.estimated_tokens,
                });
                continue;
            }

            if candidate.chunk_count > 0 {
                let top_k = config.oversize_chunk_limit.min(candidate.chunk_count);
                let estimated = (candidate.estimated_tokens / candidate.chunk_count) * top_k;

                if top_k > 0 && estimated <= remaining {
                    remaining -= estimated;
                    info!(
                        file = %candidate.base_path,
                        total_chunks = candidate.chunk_count,
                        included_chunks = top_k,
                        estimated_tokens = estimated,
                        "including top chunks of oversized file"
                    );
                    selected.push(FileSelection {
                        base_path: candidate.base_path,
                        language: candidate.language,
                        score: candidate.hybrid_score,
                        is_partial: true,
                        estimated_tokens: estimated,
                    });
                    continue;
                }
            }

            warn!(
                file = %candidate.base_path,
                remaining_budget = remaining,
                file_tokens = candidate.estimated_tokens,
                "skipping file, budget exhausted even for top chunks"
            );
        }

        selected
    }

    /// Fetch every chunk of each selection, order by chunk index, and join
    /// into file content. Partial selections keep only the leading chunks.
    async fn reconstruct(&self, selections: &[FileSelection]) -> Vec<ContextFile> {
        let mut results = Vec::with_capacity(selections.len());

        for selection in selections {
            let mut chunks = match self
                .store
                .scroll_by_base_path(&selection.base_path, SCROLL_CAP)
                .await
            {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(file = %selection.base_path, error = %e, "failed to fetch chunks");
                    continue;
                }
            };

            if chunks.is_empty() {
                continue;
            }

            chunks.sort_by_key(|c| c.chunk_index);

            if selection.is_partial {
                chunks.truncate(self.config.oversize_chunk_limit);
            }

            let content = chunks
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>()
                .join("\n");

            results.push(ContextFile {
                path: selection.base_path.clone(),
                language: selection.language.clone(),
                content,
                score: selection.score,
            });
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::StoredChunk;
    use sha2::Digest;

    /// Mock that always answers queries with a fixed direction so chunk
    /// scores equal the first component of their stored vector.
    struct FixedQueryEmbedding;

    #[async_trait::async_trait]
    impl EmbeddingClient for FixedQueryEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    /// Vector whose cosine similarity with the fixed query is exactly
    /// `score`.
    fn vector_scoring(score: f32) -> Vec<f32> {
        vec![score, (1.0 - score * score).max(0.0).sqrt()]
    }

    fn chunk(base: &str, index: usize, count: usize, content: &str) -> StoredChunk {
        StoredChunk {
            file_path: crate::store::chunk_file_path(base, index, count),
            base_path: base.to_string(),
            content: content.to_string(),
            language: "go".to_string(),
            file_hash: hex::encode(sha2::Sha256::digest(content.as_bytes())),
            chunk_index: index,
        }
    }

    async fn retriever_with(
        files: &[(&str, f32, &str)],
        config: RetrievalConfig,
    ) -> (Retriever, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new("mesh-test-main-v1".to_string()));
        for (path, score, content) in files {
            store
                .upsert(chunk(path, 0, 1, content), vector_scoring(*score))
                .await
                .unwrap();
        }
        let retriever = Retriever::new(
            Arc::clone(&store) as Arc<dyn VectorStore>,
            Arc::new(FixedQueryEmbedding),
            config,
        )
        .unwrap();
        (retriever, store)
    }

    fn candidate(base: &str, best: f32, tokens: usize, chunks: usize) -> FileCandidate {
        FileCandidate {
            base_path: base.to_string(),
            language: "go".to_string(),
            best_chunk_score: best,
            top_chunk_scores: vec![best],
            chunk_count: chunks,
            keyword_score: 0.0,
            path_score: 0.0,
            hybrid_score: best,
            estimated_tokens: tokens,
        }
    }

    fn test_config() -> RetrievalConfig {
        RetrievalConfig::default()
    }

    #[tokio::test]
    async fn test_retrieve_empty_store_returns_empty() {
        let (retriever, _) = retriever_with(&[], test_config()).await;
        let results = retriever.retrieve("where is the session store?").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_orders_by_relevance() {
        let (retriever, _) = retriever_with(
            &[
                ("src/db.go", 0.92, "func OpenPool() {}"),
                ("src/http.go", 0.55, "func Serve() {}"),
                ("src/auth.go", 0.80, "func Login() {}"),
            ],
            test_config(),
        )
        .await;

        let results = retriever.retrieve("database pool setup").await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].path, "src/db.go");
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_retrieve_respects_max_files_limit() {
        let files: Vec<(String, f32)> = (0..20)
            .map(|i| (format!("src/file{i:02}.go"), 0.90 - i as f32 * 0.01))
            .collect();

        let store = Arc::new(MemoryStore::new("mesh-test-main-v1".to_string()));
        for (path, score) in &files {
            store
                .upsert(chunk(path, 0, 1, "func X() {}"), vector_scoring(*score))
                .await
                .unwrap();
        }

        let config = RetrievalConfig {
            max_files_limit: 5,
            ..Default::default()
        };
        let retriever = Retriever::new(
            store as Arc<dyn VectorStore>,
            Arc::new(FixedQueryEmbedding),
            config,
        )
        .unwrap();

        let results = retriever.retrieve("anything at all really").await.unwrap();
        assert!(results.len() <= 5);
    }

    #[tokio::test]
    async fn test_retrieve_all_stopword_query_still_selects() {
        let (retriever, _) = retriever_with(
            &[
                ("src/a.go", 0.85, "func A() {}"),
                ("src/b.go", 0.70, "func B() {}"),
            ],
            test_config(),
        )
        .await;

        // Keywords are empty; semantic-only mode must still return files.
        let results = retriever.retrieve("what is this for").await.unwrap();
        assert!(!results.is_empty());
        assert!(results.len() <= 10);
    }

    #[tokio::test]
    async fn test_retrieve_reconstructs_multi_chunk_files_in_order() {
        let store = Arc::new(MemoryStore::new("mesh-test-main-v1".to_string()));
        for i in 0..3 {
            store
                .upsert(
                    chunk("src/big.go", i, 3, &format!("// part {i}")),
                    vector_scoring(0.9 - i as f32 * 0.05),
                )
                .await
                .unwrap();
        }

        let retriever = Retriever::new(
            store as Arc<dyn VectorStore>,
            Arc::new(FixedQueryEmbedding),
            test_config(),
        )
        .unwrap();

        let results = retriever.retrieve("big module internals").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "// part 0\n// part 1\n// part 2");
    }

    #[test]
    fn test_adaptive_threshold_relaxation_scenario() {
        // Twelve files scoring 0.05..=0.16; p75 over the floor keeps only
        // two, so the threshold relaxes to the 6th-highest score (0.11).
        let candidates: Vec<FileCandidate> = (0..12)
            .map(|i| candidate(&format!("f{i}.go"), 0.05 + i as f32 * 0.01, 100, 1))
            .collect();

        let store = Arc::new(MemoryStore::new("t".to_string()));
        let retriever = Retriever::new(
            store as Arc<dyn VectorStore>,
            Arc::new(FixedQueryEmbedding),
            test_config(),
        )
        .unwrap();

        let threshold = retriever.adaptive_threshold(&candidates);
        assert!((threshold - 0.11).abs() < 1e-6);

        let survivors = candidates
            .iter()
            .filter(|c| c.best_chunk_score >= threshold)
            .count();
        assert_eq!(survivors, 6);
    }

    #[test]
    fn test_adaptive_threshold_uses_floor_when_distribution_low() {
        // Plenty of survivors above the floor: no relaxation needed.
        let candidates: Vec<FileCandidate> = (0..10)
            .map(|i| candidate(&format!("f{i}.go"), 0.05 + i as f32 * 0.07, 100, 1))
            .collect();

        let store = Arc::new(MemoryStore::new("t".to_string()));
        let retriever = Retriever::new(
            store as Arc<dyn VectorStore>,
            Arc::new(FixedQueryEmbedding),
            test_config(),
        )
        .unwrap();

        let threshold = retriever.adaptive_threshold(&candidates);
        assert!(threshold >= 0.15);
    }

    #[test]
    fn test_budget_partial_take_scenario() {
        // Remaining budget 8000; a 24000-token file with 12 chunks and
        // oversize limit 4 fits exactly as a partial take.
        let config = RetrievalConfig {
            max_token_budget: 33_000,
            reserve_tokens: 25_000,
            ..Default::default()
        };
        let store = Arc::new(MemoryStore::new("t".to_string()));
        let retriever = Retriever::new(
            store as Arc<dyn VectorStore>,
            Arc::new(FixedQueryEmbedding),
            config,
        )
        .unwrap();

        let selections =
            retriever.select_within_budget(vec![candidate("docs/e.md", 0.9, 24_000, 12)]);

        assert_eq!(selections.len(), 1);
        assert!(selections[0].is_partial);
        assert_eq!(selections[0].estimated_tokens, 8_000);
    }

    #[test]
    fn test_budget_skips_file_too_large_even_partial() {
        let config = RetrievalConfig {
            max_token_budget: 26_000,
            reserve_tokens: 25_000,
            ..Default::default()
        };
        let store = Arc::new(MemoryStore::new("t".to_string()));
        let retriever = Retriever::new(
            store as Arc<dyn VectorStore>,
            Arc::new(FixedQueryEmbedding),
            config,
        )
        .unwrap();

        // 1000-token budget; even 4 of the 12 chunks need 8000.
        let selections =
            retriever.select_within_budget(vec![candidate("huge.md", 0.9, 24_000, 12)]);
        assert!(selections.is_empty());
    }

    #[test]
    fn test_hybrid_penalties() {
        let store = Arc::new(MemoryStore::new("t".to_string()));
        let retriever = Retriever::new(
            store as Arc<dyn VectorStore>,
            Arc::new(FixedQueryEmbedding),
            test_config(),
        )
        .unwrap();

        let mut candidates = vec![
            candidate("src/app.go", 0.8, 100, 1),
            candidate(".github/workflows/ci.yml", 0.8, 100, 1),
            candidate("package-lock.json", 0.8, 100, 1),
        ];
        let mut big_md = candidate("docs/guide.md", 0.8, 20_000, 1);
        big_md.estimated_tokens = 20_000;
        candidates.push(big_md);

        retriever.apply_hybrid_scoring(&mut candidates, &[]);

        let by_path: HashMap<&str, f32> = candidates
            .iter()
            .map(|c| (c.base_path.as_str(), c.hybrid_score))
            .collect();

        let code = by_path["src/app.go"];
        assert!((by_path[".github/workflows/ci.yml"] - code * 0.50).abs() < 1e-6);
        assert!((by_path["package-lock.json"] - code * 0.40).abs() < 1e-6);
        assert!((by_path["docs/guide.md"] - code * 0.70).abs() < 1e-6);
    }

    #[test]
    fn test_hybrid_score_bounded_before_penalties() {
        let store = Arc::new(MemoryStore::new("t".to_string()));
        let retriever = Retriever::new(
            store as Arc<dyn VectorStore>,
            Arc::new(FixedQueryEmbedding),
            test_config(),
        )
        .unwrap();

        let mut candidates = vec![FileCandidate {
            base_path: "src/all.go".to_string(),
            language: "go".to_string(),
            best_chunk_score: 1.0,
            top_chunk_scores: vec![1.0, 1.0, 1.0],
            chunk_count: 3,
            keyword_score: 1.0,
            path_score: 1.0,
            hybrid_score: 0.0,
            estimated_tokens: 100,
        }];

        let keywords: Vec<String> = vec!["all".to_string()];
        retriever.apply_hybrid_scoring(&mut candidates, &keywords);
        assert!(candidates[0].hybrid_score <= 1.0 + 1e-6);
        assert!(candidates[0].hybrid_score >= 0.0);
    }
}
