//! Version-control queries for branch-aware indexing.
//!
//! The core needs exactly four questions answered about a working copy:
//! the current branch, the head commit, a named branch's commit, and the
//! files changed between a commit and HEAD. Anything richer is out of
//! scope.

use std::collections::BTreeSet;
use std::path::Path;

use git2::Repository;

use crate::error::{Error, Result};

/// Whether the path is a git working copy.
pub fn is_repo(path: &Path) -> bool {
    Repository::open(path).is_ok()
}

/// Name of the currently checked-out branch.
pub fn current_branch(path: &Path) -> Result<String> {
    let repo = Repository::open(path)?;
    let head = repo.head().map_err(|e| not_found(e, "HEAD"))?;
    head.shorthand()
        .map(str::to_string)
        .ok_or_else(|| Error::NotFound("current branch name".to_string()))
}

/// Commit SHA the working copy's HEAD points at.
pub fn head_commit(path: &Path) -> Result<String> {
    let repo = Repository::open(path)?;
    let commit = repo
        .head()
        .and_then(|h| h.peel_to_commit())
        .map_err(|e| not_found(e, "HEAD commit"))?;
    Ok(commit.id().to_string())
}

/// Commit SHA a named branch points at.
pub fn branch_commit(path: &Path, branch: &str) -> Result<String> {
    let repo = Repository::open(path)?;
    let commit = repo
        .revparse_single(branch)
        .and_then(|obj| obj.peel_to_commit())
        .map_err(|e| not_found(e, branch))?;
    Ok(commit.id().to_string())
}

/// Relative paths of files changed between `from_commit` and HEAD.
/// Renames surface as two entries: the old path (gone) and the new one.
pub fn changed_files(path: &Path, from_commit: &str) -> Result<Vec<String>> {
    let repo = Repository::open(path)?;

    let from_tree = repo
        .revparse_single(from_commit)
        .and_then(|obj| obj.peel_to_commit())
        .map_err(|e| not_found(e, from_commit))?
        .tree()?;
    let head_tree = repo
        .head()
        .and_then(|h| h.peel_to_commit())
        .map_err(|e| not_found(e, "HEAD commit"))?
        .tree()?;

    let diff = repo.diff_tree_to_tree(Some(&from_tree), Some(&head_tree), None)?;

    let mut files = BTreeSet::new();
    for delta in diff.deltas() {
        if let Some(p) = delta.old_file().path() {
            files.insert(p.to_string_lossy().to_string());
        }
        if let Some(p) = delta.new_file().path() {
            files.insert(p.to_string_lossy().to_string());
        }
    }

    Ok(files.into_iter().collect())
}

/// Filesystem- and collection-safe branch name: `feature/x` -> `feature-x`.
/// Idempotent.
pub fn sanitize_branch(branch: &str) -> String {
    branch
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            other => other,
        })
        .collect()
}

fn not_found(err: git2::Error, what: &str) -> Error {
    if err.code() == git2::ErrorCode::NotFound || err.code() == git2::ErrorCode::UnbornBranch {
        Error::NotFound(what.to_string())
    } else {
        Error::Git(err)
    }
}
