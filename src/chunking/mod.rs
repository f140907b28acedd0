//! Token-budget chunking: whole-file embedding for small files, language
//! boundary-aware splitting for Go and TypeScript/JavaScript, line-window
//! fallback for everything else.
//!
//! The token estimator is intentionally a conservative character count, not
//! a real tokenizer; every budget below is defined in terms of it.

pub mod boundary;
pub mod lines;

use sha2::{Digest, Sha256};

/// Safe chunk size to stay under the embedding model's context limit.
pub const MAX_TOKENS_PER_CHUNK: usize = 3500;
/// Overlap between adjacent chunks for context continuity.
pub const OVERLAP_TOKENS: usize = 250;
/// Embed the whole file as one chunk if it fits under this.
pub const MAX_TOKENS_WHOLE_FILE: usize = 3200;
/// Chunks shorter than this are dropped after splitting.
pub const MIN_CHUNK_CHARS: usize = 500;

/// Conservative estimate: 1 token per 4 characters of code or text.
const CHARS_PER_TOKEN: usize = 4;

/// A chunk of one source file with position metadata and stable identity.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Repo-relative path of the originating file.
    pub base_path: String,
    /// Dense index within `base_path`, starting at 0.
    pub chunk_index: usize,
    /// Stable id: truncated hash of `base_path:start_line:end_line`.
    pub chunk_id: String,
    /// The chunk text exactly as it will be embedded.
    pub content: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    /// Registry language tag, `"text"` if unknown.
    pub language: String,
    /// Hash of the whole originating file.
    pub file_hash: String,
}

/// Intermediate output of the splitters, before filtering and numbering.
#[derive(Debug, Clone)]
pub(crate) struct RawChunk {
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// Conservative token count estimate, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(CHARS_PER_TOKEN)
}

/// Converts a token budget to an approximate character budget.
pub fn chars_for_tokens(tokens: usize) -> usize {
    tokens * CHARS_PER_TOKEN
}

/// Hex-encoded hash of full file content, used for change detection.
pub fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

const GO_BOUNDARIES: &[&str] = &["func ", "type ", "const ", "var ", "package ", "import "];
const TS_BOUNDARIES: &[&str] = &[
    "export ",
    "class ",
    "function ",
    "const ",
    "interface ",
    "type ",
];

/// Split a file into embedding-sized chunks.
///
/// Files under [`MAX_TOKENS_WHOLE_FILE`] become a single chunk covering the
/// whole file. Larger files are split by language-specific top-level
/// boundaries where available, otherwise by line windows. For a given
/// `(base_path, content)` the output is deterministic.
pub fn chunk_file(base_path: &str, content: &str, language: &str) -> Vec<Chunk> {
    let max_chars = chars_for_tokens(MAX_TOKENS_PER_CHUNK);
    let overlap_chars = chars_for_tokens(OVERLAP_TOKENS);
    let file_hash = hash_content(content);

    if estimate_tokens(content) <= MAX_TOKENS_WHOLE_FILE {
        let end_line = content.matches('\n').count() + 1;
        return vec![Chunk {
            base_path: base_path.to_string(),
            chunk_index: 0,
            chunk_id: chunk_id(base_path, 1, end_line),
            content: content.to_string(),
            start_line: 1,
            end_line,
            language: language_tag(language),
            file_hash,
        }];
    }

    let raw = match language {
        "go" => boundary::chunk_at_boundaries(content, GO_BOUNDARIES, max_chars, overlap_chars),
        "typescript" | "javascript" => {
            boundary::chunk_at_boundaries(content, TS_BOUNDARIES, max_chars, overlap_chars)
        }
        _ => lines::chunk_by_lines(content, max_chars, overlap_chars),
    };

    // Drop tiny chunks, then re-number so indices stay dense from 0. The
    // retriever orders reconstruction by chunk_index and the store keys
    // chunk paths on it, so gaps are not allowed.
    raw.into_iter()
        .filter(|c| c.content.len() >= MIN_CHUNK_CHARS)
        .enumerate()
        .map(|(i, c)| Chunk {
            base_path: base_path.to_string(),
            chunk_index: i,
            chunk_id: chunk_id(base_path, c.start_line, c.end_line),
            content: c.content,
            start_line: c.start_line,
            end_line: c.end_line,
            language: language_tag(language),
            file_hash: file_hash.clone(),
        })
        .collect()
}

fn language_tag(language: &str) -> String {
    if language.is_empty() {
        "text".to_string()
    } else {
        language.to_string()
    }
}

/// Stable chunk identifier: first 8 bytes of the hash, hex-encoded.
/// Identical `(base_path, start_line, end_line)` always map to the same id.
pub fn chunk_id(base_path: &str, start_line: usize, end_line: usize) -> String {
    let key = format!("{base_path}:{start_line}:{end_line}");
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn go_source(functions: usize, body_lines: usize) -> String {
        let mut src = String::from("package demo\n\n");
        for f in 0..functions {
            src.push_str(&format!("func Handler{f}(w ResponseWriter, r *Request) {{\n"));
            for l in 0..body_lines {
                src.push_str(&format!(
                    "\tresult_{f}_{l} := compute(\"{f}-{l}\", someFairlyLongArgumentName{l})\n"
                ));
            }
            src.push_str("}\n\n");
        }
        src
    }

    #[test]
    fn test_small_file_single_chunk() {
        let content = "package a\n";
        let chunks = chunk_file("a.go", content, "go");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert_eq!(chunks[0].content, content);
        assert_eq!(chunks[0].language, "go");
    }

    #[test]
    fn test_whole_file_threshold_boundary() {
        // Exactly MAX_TOKENS_WHOLE_FILE estimated tokens: still one chunk.
        let content = "x".repeat(chars_for_tokens(MAX_TOKENS_WHOLE_FILE));
        let chunks = chunk_file("exact.txt", &content, "");
        assert_eq!(chunks.len(), 1);

        // Comfortably over the threshold: must split.
        let content = "some text line\n".repeat(2000);
        let chunks = chunk_file("over.txt", &content, "");
        assert!(chunks.len() > 1);
    }

    #[test]
    fn test_go_file_splits_at_function_boundaries() {
        let src = go_source(20, 12);
        assert!(estimate_tokens(&src) > MAX_TOKENS_WHOLE_FILE);

        let chunks = chunk_file("server.go", &src, "go");
        assert!(chunks.len() >= 2, "expected >= 2 chunks, got {}", chunks.len());
    }

    #[test]
    fn test_chunks_respect_token_cap() {
        let src = go_source(60, 20);
        for chunk in chunk_file("big.go", &src, "go") {
            let tokens = estimate_tokens(&chunk.content);
            assert!(
                tokens as f64 <= MAX_TOKENS_PER_CHUNK as f64 * 1.01,
                "chunk of {tokens} tokens exceeds cap"
            );
        }

        let plain: String = (0..9000).map(|i| format!("line number {i}\n")).collect();
        for chunk in chunk_file("notes.txt", &plain, "") {
            let tokens = estimate_tokens(&chunk.content);
            assert!(tokens as f64 <= MAX_TOKENS_PER_CHUNK as f64 * 1.01);
        }
    }

    #[test]
    fn test_adjacent_chunks_share_overlap() {
        let src = go_source(30, 15);
        let chunks = chunk_file("overlap.go", &src, "go");
        assert!(chunks.len() >= 2);

        for pair in chunks.windows(2) {
            let prev: Vec<&str> = pair[0]
                .content
                .lines()
                .filter(|l| l.trim().len() > 10)
                .collect();
            let shares = pair[1]
                .content
                .lines()
                .filter(|l| l.trim().len() > 10)
                .any(|l| prev.contains(&l));
            assert!(shares, "adjacent chunks should share a nontrivial line");
        }
    }

    #[test]
    fn test_chunk_indices_dense_from_zero() {
        let src = go_source(40, 18);
        let chunks = chunk_file("dense.go", &src, "go");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
        }
    }

    #[test]
    fn test_min_chunk_filter() {
        for chunk in chunk_file("big.go", &go_source(60, 20), "go") {
            assert!(chunk.content.len() >= MIN_CHUNK_CHARS);
        }
    }

    #[test]
    fn test_chunk_id_stable() {
        let a = chunk_id("src/main.go", 10, 42);
        let b = chunk_id("src/main.go", 10, 42);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16); // 8 bytes hex
        assert_ne!(a, chunk_id("src/main.go", 10, 43));
        assert_ne!(a, chunk_id("src/other.go", 10, 42));
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let src = go_source(25, 14);
        let first = chunk_file("d.go", &src, "go");
        let second = chunk_file("d.go", &src, "go");
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.chunk_id, b.chunk_id);
            assert_eq!(a.content, b.content);
        }
    }

    #[test]
    fn test_unknown_language_maps_to_text() {
        let chunks = chunk_file("notes", "short note\n", "");
        assert_eq!(chunks[0].language, "text");
    }

    #[test]
    fn test_giant_single_line_respects_cap() {
        let content = "x".repeat(600_000);
        let chunks = chunk_file("blob.txt", &content, "");
        assert!(!chunks.is_empty());
        for chunk in chunks {
            let tokens = estimate_tokens(&chunk.content);
            assert!(tokens as f64 <= MAX_TOKENS_PER_CHUNK as f64 * 1.01);
        }
    }

    #[test]
    fn test_file_hash_tracks_content() {
        let a = chunk_file("f.go", "package a\n", "go");
        let b = chunk_file("f.go", "package b\n", "go");
        assert_ne!(a[0].file_hash, b[0].file_hash);
    }
}
