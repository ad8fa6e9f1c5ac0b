use serde::{Deserialize, Serialize};

/// Half-open byte range into the original (pre-preprocessing) document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
}

/// A sentence-like unit produced by the segmenter. `text` is trimmed;
/// `start`/`end` still index the untrimmed input handed to [`crate::segment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceSpan {
    pub id: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// An embedding unit: bounded text plus its position in the source
/// document. `span` is `None` for synthetic chunks that have no position
/// (a title-only chunk), rendered externally as `-1/-1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub span: Option<ChunkSpan>,
    pub segment_ids: Vec<String>,
}

impl Chunk {
    /// External form of the start offset (`-1` when offset-less).
    pub fn offset_start(&self) -> i64 {
        self.span.map_or(-1, |span| span.start as i64)
    }

    /// External form of the end offset (`-1` when offset-less).
    pub fn offset_end(&self) -> i64 {
        self.span.map_or(-1, |span| span.end as i64)
    }

    /// A chunk with no position in the source document.
    pub fn synthetic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            span: None,
            segment_ids: Vec::new(),
        }
    }
}
