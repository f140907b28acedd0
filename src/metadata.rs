//! Per-branch indexing state, persisted as flat JSON files under the state
//! root. Knowing the last indexed commit for a `{repo, branch}` pair is
//! what makes incremental re-indexing and the branch scanner possible.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::git::sanitize_branch;

/// Indexing state for one `{repo, branch}` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchMetadata {
    pub repo_name: String,
    /// Unsanitized branch name, as git knows it.
    pub branch: String,
    pub commit_sha: String,
    pub indexed_at: DateTime<Utc>,
    pub file_count: usize,
}

/// Flat-file store: `<root>/<repo>/<sanitized-branch>/metadata.json`.
pub struct BranchMetadataStore {
    root: PathBuf,
}

impl BranchMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn metadata_path(&self, repo_name: &str, branch: &str) -> PathBuf {
        self.root
            .join(repo_name)
            .join(sanitize_branch(branch))
            .join("metadata.json")
    }

    /// Load metadata for a branch. A missing file means the branch was
    /// never indexed and is not an error; an unparsable file is.
    pub fn load(&self, repo_name: &str, branch: &str) -> Result<Option<BranchMetadata>> {
        let path = self.metadata_path(repo_name, branch);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| Error::DataIntegrity(format!("metadata at {}: {e}", path.display())))
    }

    /// Persist metadata atomically (write to a temp file, then rename).
    pub fn save(&self, meta: &BranchMetadata) -> Result<()> {
        let path = self.metadata_path(&meta.repo_name, &meta.branch);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(meta)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Unsanitized names of every branch that has been indexed for a repo.
    ///
    /// Directory names are sanitized, so the original name is recovered
    /// from the metadata file itself; entries that are missing or corrupt
    /// are skipped.
    pub fn known_branches(&self, repo_name: &str) -> Vec<String> {
        let repo_dir = self.root.join(repo_name);
        let entries = match fs::read_dir(&repo_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut branches = Vec::new();
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let meta_path = entry.path().join("metadata.json");
            let Ok(data) = fs::read_to_string(&meta_path) else {
                continue;
            };
            match serde_json::from_str::<BranchMetadata>(&data) {
                Ok(meta) => branches.push(meta.branch),
                Err(_) => continue,
            }
        }

        branches.sort();
        branches
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
