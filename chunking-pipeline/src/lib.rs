//! Offset-preserving text chunking.
//!
//! Documents pass through three stages: preprocessing (metadata-fence
//! stripping, URL blanking), sentence segmentation, and greedy chunk
//! packing. Every reported offset is a byte offset into the *unmodified*
//! source document, which is what makes downstream position metadata
//! trustworthy. A content-addressed cache memoizes whole-document results.

mod assembler;
mod cache;
mod config;
mod preprocess;
mod segmenter;
mod types;

pub use assembler::assemble_chunks;
pub use cache::ChunkCache;
pub use config::{CacheTuning, ChunkingTuning};
pub use preprocess::{blank_urls, strip_metadata_block};
pub use segmenter::segment;
pub use types::{Chunk, ChunkSpan, SentenceSpan};
