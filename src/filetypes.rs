//! File classification: which paths are indexable, what language they are,
//! and which directories a repository walk should skip entirely.
//!
//! This module is the single authority on these questions; the indexer,
//! chunker, and store all delegate here instead of keeping their own
//! extension lists.

use std::path::Path;

/// Returns true if the file should be indexed based on its extension.
pub fn is_indexable(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    matches!(
        ext.as_str(),
        "go" | "js"
            | "ts"
            | "tsx"
            | "jsx"
            | "mjs"
            | "cjs"
            | "py"
            | "java"
            | "kt"
            | "kts"
            | "scala"
            | "c"
            | "cpp"
            | "cc"
            | "cxx"
            | "h"
            | "hpp"
            | "hxx"
            | "cs"
            | "rb"
            | "php"
            | "swift"
            | "rs"
            | "sh"
            | "bash"
            | "zsh"
            | "proto"
            | "sql"
            | "yaml"
            | "yml"
            | "json"
            | "toml"
            | "xml"
            | "md"
            | "rst"
    )
}

/// Returns the language tag for a file path, or `""` if unrecognized.
pub fn language_of(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "go" => "go",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" => "python",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hxx" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "rs" => "rust",
        "sh" | "bash" | "zsh" => "bash",
        "proto" => "protobuf",
        "sql" => "sql",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        "toml" => "toml",
        "xml" => "xml",
        "md" => "markdown",
        "rst" => "restructuredtext",
        _ => "",
    }
}

/// Returns true if a directory should be skipped during repository walks.
///
/// Hidden directories are skipped wholesale, with `.github` as the one
/// exception (workflow files are indexable, if penalized at ranking time).
pub fn is_skip_dir(name: &str) -> bool {
    if name.starts_with('.') && name != "." && name != ".." && name != ".github" {
        return true;
    }

    matches!(
        name,
        ".git"
            | ".svn"
            | ".hg"
            | "node_modules"
            | "vendor"
            | "dist"
            | "build"
            | "target"
            | "out"
            | "__pycache__"
            | ".venv"
            | "venv"
            | ".tox"
            | ".idea"
            | ".vscode"
            | ".vs"
            | ".next"
            | ".cache"
            | "tmp"
            | "temp"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexable_code_files() {
        assert!(is_indexable(Path::new("src/main.go")));
        assert!(is_indexable(Path::new("app.py")));
        assert!(is_indexable(Path::new("lib/index.ts")));
        assert!(is_indexable(Path::new("schema.proto")));
        assert!(is_indexable(Path::new("README.md")));
        assert!(is_indexable(Path::new("Config.TOML")));
    }

    #[test]
    fn test_not_indexable_binaries_and_unknown() {
        assert!(!is_indexable(Path::new("photo.png")));
        assert!(!is_indexable(Path::new("app.exe")));
        assert!(!is_indexable(Path::new("archive.zip")));
        assert!(!is_indexable(Path::new("no_extension")));
    }

    #[test]
    fn test_language_lookup() {
        assert_eq!(language_of(Path::new("main.go")), "go");
        assert_eq!(language_of(Path::new("app.tsx")), "typescript");
        assert_eq!(language_of(Path::new("util.mjs")), "javascript");
        assert_eq!(language_of(Path::new("lib.rs")), "rust");
        assert_eq!(language_of(Path::new("notes.md")), "markdown");
    }

    #[test]
    fn test_language_unknown_is_empty() {
        assert_eq!(language_of(Path::new("data.bin")), "");
        assert_eq!(language_of(Path::new("LICENSE")), "");
    }

    #[test]
    fn test_skip_dirs() {
        assert!(is_skip_dir(".git"));
        assert!(is_skip_dir("node_modules"));
        assert!(is_skip_dir("target"));
        assert!(is_skip_dir("__pycache__"));
        assert!(is_skip_dir(".idea"));
    }

    #[test]
    fn test_hidden_dirs_skipped_except_github() {
        assert!(is_skip_dir(".anything-hidden"));
        assert!(!is_skip_dir(".github"));
        assert!(!is_skip_dir("src"));
        assert!(!is_skip_dir("internal"));
    }
}
