//! Greedy packing of sentence spans into bounded chunks.

use std::borrow::Cow;

use crate::config::ChunkingTuning;
use crate::preprocess::{blank_urls, strip_metadata_block};
use crate::segmenter::segment;
use crate::types::{Chunk, ChunkSpan, SentenceSpan};

/// Full chunking pass over one document: strip the leading metadata block,
/// blank URLs, segment, then pack. Every chunk offset is compensated by
/// the stripped prefix length so it indexes the unmodified `text`.
pub fn assemble_chunks(text: &str, tuning: &ChunkingTuning) -> Vec<Chunk> {
    let (body, removed) = strip_metadata_block(text);
    let cleaned: Cow<'_, str> = blank_urls(body);
    if cleaned.trim().is_empty() {
        return Vec::new();
    }

    let spans = segment(&cleaned, tuning);
    pack_spans(&spans, removed, tuning)
}

/// Packs consecutive spans into chunks of at most `max_chunk_characters`
/// bytes (spans joined with a single space). A span already at or past the
/// bound is emitted verbatim as its own chunk after flushing whatever was
/// accumulating.
fn pack_spans(spans: &[SentenceSpan], offset_shift: usize, tuning: &ChunkingTuning) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut pending: Vec<&SentenceSpan> = Vec::new();
    let mut pending_len = 0usize;

    for span in spans {
        if span.text.len() >= tuning.max_chunk_characters {
            flush(&mut pending, offset_shift, &mut chunks);
            pending_len = 0;
            chunks.push(chunk_from(std::slice::from_ref(&span), offset_shift));
            continue;
        }

        let projected = if pending.is_empty() {
            span.text.len()
        } else {
            pending_len + 1 + span.text.len()
        };

        if !pending.is_empty() && projected > tuning.max_chunk_characters {
            flush(&mut pending, offset_shift, &mut chunks);
            pending.push(span);
            pending_len = span.text.len();
        } else {
            pending.push(span);
            pending_len = projected;
        }
    }

    flush(&mut pending, offset_shift, &mut chunks);
    chunks
}

fn flush(pending: &mut Vec<&SentenceSpan>, offset_shift: usize, chunks: &mut Vec<Chunk>) {
    if pending.is_empty() {
        return;
    }
    chunks.push(chunk_from(pending, offset_shift));
    pending.clear();
}

fn chunk_from(spans: &[&SentenceSpan], offset_shift: usize) -> Chunk {
    let text = spans
        .iter()
        .map(|span| span.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let span = match (spans.first(), spans.last()) {
        (Some(first), Some(last)) => Some(ChunkSpan {
            start: first.start + offset_shift,
            end: last.end + offset_shift,
        }),
        _ => None,
    };

    Chunk {
        text,
        span,
        segment_ids: spans.iter().map(|span| span.id.clone()).collect(),
    }
}
