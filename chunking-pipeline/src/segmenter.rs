//! Sentence segmentation with exact byte offsets.
//!
//! The segmenter walks the text once, ending a unit after a terminator
//! run or a newline, trims each unit, and subdivides anything longer than
//! the configured maximum. Offsets always index the input text it was
//! handed, untrimmed.

use crate::config::ChunkingTuning;
use crate::types::SentenceSpan;

/// Sentence-ending punctuation, ASCII and fullwidth.
const TERMINATORS: [char; 7] = ['.', '!', '?', '…', '。', '！', '？'];

fn is_terminator(ch: char) -> bool {
    TERMINATORS.contains(&ch)
}

/// Splits `text` into ordered, non-overlapping sentence-like spans.
///
/// Empty or whitespace-only input yields an empty list. Spans longer than
/// `max_sentence_characters` are subdivided by a backward boundary search
/// that never cuts below `min_sentence_characters`, force-splitting at the
/// maximum when no boundary exists in that window.
pub fn segment(text: &str, tuning: &ChunkingTuning) -> Vec<SentenceSpan> {
    let mut spans = Vec::new();

    for (start, end) in raw_sentence_ranges(text) {
        let Some((start, end)) = trimmed_range(text, start, end) else {
            continue;
        };

        if end - start > tuning.max_sentence_characters {
            for (piece_start, piece_end) in subdivide(text, start, end, tuning) {
                if let Some(range) = trimmed_range(text, piece_start, piece_end) {
                    spans.push(range);
                }
            }
        } else {
            spans.push((start, end));
        }
    }

    spans
        .into_iter()
        .enumerate()
        .map(|(ordinal, (start, end))| SentenceSpan {
            id: format!("seg-{ordinal}"),
            text: text.get(start..end).unwrap_or("").to_string(),
            start,
            end,
        })
        .collect()
}

/// Contiguous ranges covering the whole input, split after terminator
/// characters (when followed by whitespace, so decimals and dotted
/// abbreviations survive) and after newlines.
fn raw_sentence_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let ends_here = if ch == '\n' {
            true
        } else if is_terminator(ch) {
            match chars.peek() {
                None => true,
                Some((_, next)) => next.is_whitespace(),
            }
        } else {
            false
        };

        if ends_here {
            let end = idx + ch.len_utf8();
            ranges.push((start, end));
            start = end;
        }
    }

    if start < text.len() {
        ranges.push((start, text.len()));
    }

    ranges
}

/// Shrinks `[start, end)` so it neither starts nor ends on whitespace.
/// Returns `None` when nothing but whitespace remains.
fn trimmed_range(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = text.get(start..end)?;
    let leading = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = start + leading;
    Some((start, start + trimmed.len()))
}

/// Cuts an over-long sentence into pieces of at most
/// `max_sentence_characters` bytes. Each cut walks backward from the
/// target length to the nearest whitespace or terminator; within the
/// minimum window it gives up and force-splits at the maximum, aligned to
/// a character boundary.
fn subdivide(
    text: &str,
    start: usize,
    end: usize,
    tuning: &ChunkingTuning,
) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut cursor = start;

    while end - cursor > tuning.max_sentence_characters {
        let mut target = cursor + tuning.max_sentence_characters;
        while !text.is_char_boundary(target) {
            target -= 1;
        }
        let floor = cursor + tuning.min_sentence_characters.min(tuning.max_sentence_characters);

        let mut cut = None;
        if let Some(window) = text.get(cursor..target) {
            for (offset, ch) in window.char_indices().rev() {
                let boundary_end = cursor + offset + ch.len_utf8();
                if boundary_end <= floor {
                    break;
                }
                if ch.is_whitespace() || is_terminator(ch) {
                    cut = Some(boundary_end);
                    break;
                }
            }
        }

        let cut = cut.unwrap_or(target);
        pieces.push((cursor, cut));
        cursor = cut;
    }

    if cursor < end {
        pieces.push((cursor, end));
    }

    pieces
}
