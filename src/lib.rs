//! # mesh
//!
//! A semantic code-search and retrieval gateway for local git
//! repositories. Each configured repository gets branch-scoped vector
//! collections of its source tree; queries come back as a bounded,
//! ranked set of reconstructed files ready to hand to an LLM.
//!
//! ## Pipelines
//!
//! ```text
//! Index path:
//!   coordinator ──> indexer ──> walk + git change detect
//!                      │
//!                      ▼  worker pool
//!             chunker ──> embedding client ──> vector store
//!                      │
//!                      ▼
//!               branch metadata (commit, indexed_at, file_count)
//!
//! Query path:
//!   question ──> embed(1×) ──> vector search ──> group chunks to files
//!       ──> adaptive threshold ──> hybrid scoring ──> token budget
//!       ──> reconstruct files ──> [{path, language, content, score}]
//!
//! Watch path:
//!   scanner tick ──> known branches ──> commit drift? ──> reindex
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration: repos, store, embedding
//! - [`filetypes`] - Which paths are indexable and what language they are
//! - [`chunking`] - Token-budget, boundary-aware file chunking
//! - [`embedding`] - Embedding provider contract (Ollama, OpenAI)
//! - [`store`] - Branch-scoped vector store contract, Qdrant + memory
//! - [`metadata`] - Per-branch indexing state on disk
//! - [`git`] - The four version-control queries the core needs
//! - [`index`] - Full and incremental indexing with a worker pool
//! - [`retrieve`] - Search, scoring, selection, and file reconstruction
//! - [`scanner`] - Periodic commit-drift watcher
//! - [`coordinator`] - Per-repository composition of all of the above
//! - [`api`] - Axum handlers for answer/reindex/stats
//! - [`state`] - Shared application state for the HTTP shell

pub mod api;
pub mod chunking;
pub mod config;
pub mod coordinator;
pub mod embedding;
pub mod error;
pub mod filetypes;
pub mod git;
pub mod index;
pub mod metadata;
pub mod models;
pub mod retrieve;
pub mod scanner;
pub mod state;
pub mod store;

pub use error::{Error, Result};
