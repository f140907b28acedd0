//! Boundary-aware splitting for languages with recognizable top-level
//! declarations. Accumulates lines and prefers to cut where a declaration
//! starts; a hard character cap overrides the preference.

use super::lines::split_oversized_line;
use super::RawChunk;

/// Split `content` into chunks, cutting at lines whose trimmed text starts
/// with one of `boundaries` once the accumulated buffer approaches
/// `max_chars`. Each new chunk is seeded with the last `overlap_chars`
/// worth of preceding lines, in source order, so adjacent chunks share
/// context.
pub(crate) fn chunk_at_boundaries(
    content: &str,
    boundaries: &[&str],
    max_chars: usize,
    overlap_chars: usize,
) -> Vec<RawChunk> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_line = 1usize;
    let mut chunk_start_line = 1usize;

    for (i, line) in lines.iter().enumerate() {
        // A single line beyond the cap can never fit any buffer; flush and
        // cut it at character offsets so the hard cap holds even for
        // minified input.
        if line.len() > max_chars {
            if !current.is_empty() {
                chunks.push(RawChunk {
                    content: std::mem::take(&mut current),
                    start_line: chunk_start_line,
                    end_line: current_line - 1,
                });
            }
            for piece in split_oversized_line(line, max_chars) {
                chunks.push(RawChunk {
                    content: piece.to_string(),
                    start_line: current_line,
                    end_line: current_line,
                });
            }
            chunk_start_line = current_line + 1;
            current_line += 1;
            continue;
        }

        let trimmed = line.trim_start();
        let is_boundary = boundaries.iter().any(|b| trimmed.starts_with(b));

        let will_exceed = current.len() + line.len() + 1 > max_chars;
        let hard_limit = current.len() >= max_chars;

        if ((will_exceed && is_boundary) || hard_limit) && !current.is_empty() {
            chunks.push(RawChunk {
                content: current.clone(),
                start_line: chunk_start_line,
                end_line: current_line - 1,
            });

            let overlap = overlap_lines(&lines, i, overlap_chars);
            chunk_start_line = i.saturating_sub(overlap.matches('\n').count()).max(1);
            current = overlap;
        }

        current.push_str(line);
        current.push('\n');
        current_line += 1;
    }

    if !current.is_empty() {
        chunks.push(RawChunk {
            content: current,
            start_line: chunk_start_line,
            end_line: current_line - 1,
        });
    }

    chunks
}

/// The last `num_chars` worth of lines before `from_index`, joined in
/// source order with a trailing newline. Empty when at the start.
fn overlap_lines(lines: &[&str], from_index: usize, num_chars: usize) -> String {
    if from_index == 0 {
        return String::new();
    }

    let mut collected: Vec<&str> = Vec::new();
    let mut chars = 0usize;

    for line in lines[..from_index].iter().rev() {
        if chars >= num_chars {
            break;
        }
        collected.push(line);
        chars += line.len() + 1;
    }

    collected.reverse();
    let mut joined = collected.join("\n");
    joined.push('\n');
    joined
}
