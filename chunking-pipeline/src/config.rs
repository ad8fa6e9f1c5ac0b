#[derive(Debug, Clone)]
pub struct ChunkingTuning {
    /// Upper bound on a chunk's text length in bytes. A single sentence at
    /// or above this length is emitted verbatim as its own chunk.
    pub max_chunk_characters: usize,
    /// Sentences longer than this are subdivided.
    pub max_sentence_characters: usize,
    /// The backward boundary search never cuts a piece shorter than this;
    /// only the final remainder of a sentence may be shorter.
    pub min_sentence_characters: usize,
}

impl Default for ChunkingTuning {
    fn default() -> Self {
        Self {
            max_chunk_characters: 1_000,
            max_sentence_characters: 300,
            min_sentence_characters: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheTuning {
    /// Entries older than this are recomputed and evicted.
    pub ttl_secs: i64,
    /// Oldest entries are evicted once the cache grows past this bound.
    pub max_entries: usize,
}

impl Default for CacheTuning {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_entries: 128,
        }
    }
}
