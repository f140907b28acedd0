//! Retrieval tuning knobs: token budget, adaptive thresholding, and hybrid
//! scoring weights. Validated once at construction; an invalid config is a
//! startup failure, never a per-query one.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Total tokens allowed for selected file content.
    pub max_token_budget: usize,
    /// Deducted from the budget before selection (prompt overhead lives
    /// outside the core but still consumes the window).
    pub reserve_tokens: usize,
    /// Chunks kept from a file that exceeds the remaining budget.
    pub oversize_chunk_limit: usize,

    /// Hard floor on chunk cosine scores.
    pub min_absolute_score: f32,
    /// Percentile of the score distribution used for the adaptive threshold.
    pub score_distribution_percentile: f32,
    /// Survivors guaranteed after thresholding.
    pub min_files_after_threshold: usize,

    /// Limit passed to the vector search.
    pub initial_chunk_limit: usize,
    /// Cap on returned files.
    pub max_files_limit: usize,

    /// Hybrid weights; must sum to 1.0 within ±0.01.
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    pub path_weight: f32,
    pub aggregate_weight: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_token_budget: 60_000,
            reserve_tokens: 25_000,
            oversize_chunk_limit: 4,

            min_absolute_score: 0.15,
            score_distribution_percentile: 0.75,
            min_files_after_threshold: 6,

            initial_chunk_limit: 50,
            max_files_limit: 10,

            semantic_weight: 0.70,
            keyword_weight: 0.15,
            path_weight: 0.05,
            aggregate_weight: 0.10,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_token_budget <= self.reserve_tokens {
            return Err(Error::Config(
                "max_token_budget must be greater than reserve_tokens".to_string(),
            ));
        }
        for (name, value) in [
            ("min_absolute_score", self.min_absolute_score),
            (
                "score_distribution_percentile",
                self.score_distribution_percentile,
            ),
            ("semantic_weight", self.semantic_weight),
            ("keyword_weight", self.keyword_weight),
            ("path_weight", self.path_weight),
            ("aggregate_weight", self.aggregate_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{name} must be between 0.0 and 1.0")));
            }
        }
        if self.min_files_after_threshold < 1 {
            return Err(Error::Config(
                "min_files_after_threshold must be at least 1".to_string(),
            ));
        }
        if self.initial_chunk_limit < self.max_files_limit {
            return Err(Error::Config(
                "initial_chunk_limit must be at least max_files_limit".to_string(),
            ));
        }

        let weight_sum = self.semantic_weight
            + self.keyword_weight
            + self.path_weight
            + self.aggregate_weight;
        if !(0.99..=1.01).contains(&weight_sum) {
            return Err(Error::Config(format!(
                "hybrid scoring weights must sum to 1.0 (got {weight_sum:.2})"
            )));
        }

        Ok(())
    }

    /// Budget actually available for file selection.
    pub fn effective_token_budget(&self) -> usize {
        self.max_token_budget - self.reserve_tokens
    }
}
