//! Line-window fallback splitting for languages without recognizable
//! top-level boundaries. Emits fixed-size windows with an approximate
//! overlap back-step between them.

use super::RawChunk;

/// Rough line width used to convert the overlap character budget into a
/// number of lines to back-step between windows.
const APPROX_CHARS_PER_LINE: usize = 50;

pub(crate) fn chunk_by_lines(
    content: &str,
    max_chars: usize,
    overlap_chars: usize,
) -> Vec<RawChunk> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut chunks = Vec::new();
    let mut i = 0usize;

    while i < lines.len() {
        let start_idx = i;
        let mut chunk = String::new();

        while i < lines.len() {
            let line = lines[i];

            // A single line over the budget is cut at character offsets.
            if line.len() > max_chars && chunk.is_empty() {
                for piece in split_oversized_line(line, max_chars) {
                    chunks.push(RawChunk {
                        content: piece.to_string(),
                        start_line: start_idx + 1,
                        end_line: start_idx + 1,
                    });
                }
                i += 1;
                break;
            }

            if !chunk.is_empty() && chunk.len() + line.len() + 1 > max_chars {
                break;
            }
            if chunk.len() >= max_chars {
                break;
            }

            chunk.push_str(line);
            chunk.push('\n');
            i += 1;
        }

        let end_line = i;

        if !chunk.is_empty() {
            chunks.push(RawChunk {
                content: chunk,
                start_line: start_idx + 1,
                end_line,
            });

            // Back-step so the next window shares trailing context, while
            // always making forward progress.
            let back_step = overlap_chars / APPROX_CHARS_PER_LINE;
            if back_step > 0 && i < lines.len() {
                i = i.saturating_sub(back_step).max(start_idx + 1);
            }
        }
    }

    chunks
}

/// Cut a single line that exceeds the budget into windows, always on UTF-8
/// char boundaries.
pub(crate) fn split_oversized_line(line: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < line.len() {
        let mut end = (start + max_chars).min(line.len());
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        pieces.push(&line[start..end]);
        start = end;
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_content_single_window() {
        let chunks = chunk_by_lines("line 1\nline 2\nline 3", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
    }

    #[test]
    fn test_windows_respect_budget() {
        let content = "a reasonably sized line of text for the window test\n".repeat(400);
        let chunks = chunk_by_lines(&content, 2000, 200);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.len() <= 2000 + 60);
        }
    }

    #[test]
    fn test_windows_overlap() {
        let content: String = (0..300)
            .map(|i| format!("identifiable line number {i:04} with padding text\n"))
            .collect();
        let chunks = chunk_by_lines(&content, 2000, 200);
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let prev_last = pair[0].content.lines().last().unwrap();
            assert!(
                pair[1].content.contains(prev_last),
                "next window should re-include back-stepped lines"
            );
        }
    }

    #[test]
    fn test_oversized_line_is_cut() {
        let long = "x".repeat(9_500);
        let pieces = split_oversized_line(&long, 2000);
        assert_eq!(pieces.len(), 5);
        assert!(pieces.iter().all(|p| p.len() <= 2000));
        assert_eq!(pieces.iter().map(|p| p.len()).sum::<usize>(), 9_500);
    }

    #[test]
    fn test_oversized_line_utf8_boundaries() {
        let long = "é".repeat(3_000); // 2 bytes each
        for piece in split_oversized_line(&long, 2_001) {
            assert!(piece.len() <= 2_001);
            assert!(piece.chars().all(|c| c == 'é'));
        }
    }

    #[test]
    fn test_mixed_oversized_and_normal_lines() {
        let content = format!("short line\n{}\nanother short line\n", "y".repeat(5000));
        let chunks = chunk_by_lines(&content, 2000, 200);
        assert!(chunks.iter().all(|c| c.content.len() <= 2000 + 60));
        let total: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert!(total.contains("short line"));
        assert!(total.contains("another short line"));
    }
}
