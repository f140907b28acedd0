//! Scoring signals for file-level ranking: conservative keyword extraction
//! with a stoplist, length-normalized keyword scoring, path matching, and
//! a multi-chunk depth signal.

/// Common English function words plus tokens so ubiquitous in code that
/// matching them would boost nearly every file.
const STOP_WORDS: &[&str] = &[
    // English
    "what", "how", "where", "when", "why", "does", "is", "are", "was", "were", "the", "a", "an",
    "in", "on", "at", "to", "for", "of", "with", "by", "from", "this", "that", "these", "those",
    "it", "its", "do", "did", "can", "could", "would", "should", "will", "shall", "may", "might",
    "must", "have", "has", "had", "been", "being", "and", "or", "but", "not", "if", "then",
    // Ubiquitous code tokens
    "ctx", "err", "error", "nil", "bool", "string", "int", "int32", "int64", "uint", "float",
    "float32", "float64", "byte", "rune", "func", "return", "else", "range", "var", "const",
    "type", "struct", "interface", "map", "slice", "array", "channel", "new", "make", "len",
    "cap", "append", "delete", "copy", "close", "defer", "go", "select", "case", "switch",
    "break", "continue", "package", "import", "export", "default", "config", "logger", "client",
    "server", "context", "request", "response", "handler", "service", "method", "function",
    "class",
];

/// A file grouped from search hits, with every signal needed for hybrid
/// ranking and budgeted selection. Lives only for the duration of a query.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub base_path: String,
    pub language: String,

    /// Highest chunk cosine score for this file.
    pub best_chunk_score: f32,
    /// Up to three highest chunk scores, descending.
    pub top_chunk_scores: Vec<f32>,
    /// Chunks of this file present in the search result.
    pub chunk_count: usize,

    pub keyword_score: f32,
    pub path_score: f32,
    pub hybrid_score: f32,

    pub estimated_tokens: usize,
}

/// A selection decision: a whole file, or the top chunks of an oversized
/// one.
#[derive(Debug, Clone)]
pub struct FileSelection {
    pub base_path: String,
    pub language: String,
    pub score: f32,
    pub is_partial: bool,
    pub estimated_tokens: usize,
}

/// Conservative keyword extraction: lowercase, split on anything outside
/// `[a-z0-9_-]`, keep tokens longer than 3 chars that are not stopwords.
/// May legitimately return nothing for conversational queries.
pub fn extract_keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'))
        .filter(|w| w.len() > 3 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Keyword score for a file's full content, normalized by file length so
/// big files don't win on volume alone.
///
/// `(matches / |keywords|) * min(ln(1 + occurrences_per_10k) / 2, 1)`
pub fn keyword_score(content: &str, keywords: &[String]) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }

    let content_lower = content.to_lowercase();
    let mut matches = 0usize;
    let mut total_occurrences = 0usize;

    for keyword in keywords {
        let count = content_lower.matches(keyword.as_str()).count();
        if count > 0 {
            matches += 1;
            total_occurrences += count;
        }
    }

    if matches == 0 {
        return 0.0;
    }

    let length_normalizer = (content.len() as f64 / 10_000.0).max(1.0);
    let normalized_occurrences = total_occurrences as f64 / length_normalizer;

    let match_ratio = matches as f32 / keywords.len() as f32;
    let occurrence_boost = (1.0 + normalized_occurrences).ln() as f32;

    match_ratio * (occurrence_boost / 2.0).min(1.0)
}

/// Fraction of keywords present in the file path. A tie-breaker signal.
pub fn path_score(path: &str, keywords: &[String]) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }

    let path_lower = path.to_lowercase();
    let matches = keywords
        .iter()
        .filter(|k| path_lower.contains(k.as_str()))
        .count();

    matches as f32 / keywords.len() as f32
}

/// Weighted combination of the top chunk scores, so files with several
/// relevant chunks rank above one-hit wonders. Missing positions
/// contribute nothing.
pub fn aggregate_score(top_scores: &[f32]) -> f32 {
    const WEIGHTS: [f32; 3] = [0.5, 0.3, 0.2];

    top_scores
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(s, w)| s * w)
        .sum()
}
