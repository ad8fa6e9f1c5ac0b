//! The vector-store seam.
//!
//! The pipeline never talks to a concrete engine; everything it needs from
//! one is captured by [`VectorStore`]. The in-memory implementation lives
//! in [`super::memory`], and a networked engine plugs in behind the same
//! trait without touching the pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A chunk scheduled for embedding + persistence. Offsets are byte offsets
/// into the unmodified source document; `-1/-1` marks an offset-less chunk
/// (e.g. a synthetic title chunk).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertRecord {
    pub file_path: String,
    pub chunk_offset_start: i64,
    pub chunk_offset_end: i64,
    pub text: String,
}

/// Position metadata attached to a stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub start_position: i64,
    pub end_position: i64,
    pub created_at: DateTime<Utc>,
}

/// A chunk as the store keeps it: text, vector and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub metadata: ChunkMetadata,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A single nearest-neighbor hit. `distance` is a non-negative
/// dissimilarity score; ascending means more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResultItem {
    pub id: String,
    pub file_path: String,
    pub chunk_offset_start: i64,
    pub chunk_offset_end: i64,
    pub distance: f32,
}

/// Outcome of an index-maintenance request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub success: bool,
    pub message: String,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or replaces chunks, keyed by `(file_path, offsets)`.
    /// Returns the number of chunks written.
    async fn upsert(&self, chunks: Vec<StoredChunk>) -> Result<usize, AppError>;

    /// Nearest neighbors of `vector`, ascending by distance, at most
    /// `limit` items, omitting every chunk whose path is in
    /// `exclude_file_paths`. Tie order is the store's own stable order.
    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        exclude_file_paths: &[String],
    ) -> Result<Vec<SimilarityResultItem>, AppError>;

    /// All stored chunk vectors for `path`, in insertion order, or `None`
    /// when the path has never been indexed.
    async fn vectors_for_path(&self, path: &str) -> Result<Option<Vec<Vec<f32>>>, AppError>;

    /// Drops all stored chunks so the index can be rebuilt from scratch.
    async fn rebuild(&self) -> Result<(), AppError>;

    /// Makes sure the store is ready to hold vectors of `dimension`.
    async fn ensure_indexes(&self, dimension: usize) -> Result<IndexReport, AppError>;

    /// Releases the store. Later operations fail with a store error.
    async fn close(&self) -> Result<(), AppError>;
}
