use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    error::AppError,
    utils::vector::cosine_distance,
};

use super::store::{IndexReport, SimilarityResultItem, StoredChunk, VectorStore};

/// Linear-scan cosine-distance store.
///
/// Good enough for vaults of a few thousand notes and for every test in
/// the workspace; anything larger belongs behind a real engine implementing
/// [`VectorStore`].
pub struct MemoryVectorStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    chunks: Vec<StoredChunk>,
    dimension: Option<usize>,
    closed: bool,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.chunks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.chunks.is_empty()
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_open(state: &MemoryState) -> Result<(), AppError> {
    if state.closed {
        return Err(AppError::Store("store is closed".into()));
    }
    Ok(())
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, chunks: Vec<StoredChunk>) -> Result<usize, AppError> {
        let mut state = self.state.lock().await;
        ensure_open(&state)?;

        let count = chunks.len();
        for incoming in chunks {
            state.chunks.retain(|existing| {
                existing.metadata.file_path != incoming.metadata.file_path
                    || existing.metadata.start_position != incoming.metadata.start_position
                    || existing.metadata.end_position != incoming.metadata.end_position
            });
            state.chunks.push(incoming);
        }

        debug!(upserted = count, total = state.chunks.len(), "memory store upsert");
        Ok(count)
    }

    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        exclude_file_paths: &[String],
    ) -> Result<Vec<SimilarityResultItem>, AppError> {
        let state = self.state.lock().await;
        ensure_open(&state)?;

        let excluded: HashSet<&str> = exclude_file_paths.iter().map(String::as_str).collect();

        let mut hits: Vec<SimilarityResultItem> = state
            .chunks
            .iter()
            .filter(|chunk| !excluded.contains(chunk.metadata.file_path.as_str()))
            .map(|chunk| SimilarityResultItem {
                id: chunk.id.clone(),
                file_path: chunk.metadata.file_path.clone(),
                chunk_offset_start: chunk.metadata.start_position,
                chunk_offset_end: chunk.metadata.end_position,
                distance: cosine_distance(vector, &chunk.embedding),
            })
            .collect();

        // Stable sort keeps insertion order among equal distances.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        Ok(hits)
    }

    async fn vectors_for_path(&self, path: &str) -> Result<Option<Vec<Vec<f32>>>, AppError> {
        let state = self.state.lock().await;
        ensure_open(&state)?;

        let vectors: Vec<Vec<f32>> = state
            .chunks
            .iter()
            .filter(|chunk| chunk.metadata.file_path == path)
            .map(|chunk| chunk.embedding.clone())
            .collect();

        if vectors.is_empty() {
            Ok(None)
        } else {
            Ok(Some(vectors))
        }
    }

    async fn rebuild(&self) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        ensure_open(&state)?;
        state.chunks.clear();
        Ok(())
    }

    async fn ensure_indexes(&self, dimension: usize) -> Result<IndexReport, AppError> {
        let mut state = self.state.lock().await;
        ensure_open(&state)?;

        state.dimension = Some(dimension);
        Ok(IndexReport {
            success: true,
            message: format!("memory store ready for dimension {dimension}"),
        })
    }

    async fn close(&self) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.chunks.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::storage::store::ChunkMetadata;

    fn chunk(id: &str, path: &str, start: i64, end: i64, embedding: Vec<f32>) -> StoredChunk {
        StoredChunk {
            id: id.to_string(),
            metadata: ChunkMetadata {
                file_path: path.to_string(),
                start_position: start,
                end_position: end,
                created_at: Utc::now(),
            },
            text: format!("chunk {id}"),
            embedding,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_same_position() {
        let store = MemoryVectorStore::new();
        store
            .upsert(vec![chunk("a", "note.md", 0, 10, vec![1.0, 0.0])])
            .await
            .expect("upsert");
        store
            .upsert(vec![chunk("b", "note.md", 0, 10, vec![0.0, 1.0])])
            .await
            .expect("upsert");

        assert_eq!(store.len().await, 1);
        let vectors = store
            .vectors_for_path("note.md")
            .await
            .expect("vectors")
            .expect("path indexed");
        assert_eq!(vectors, vec![vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn query_ranks_by_ascending_distance() {
        let store = MemoryVectorStore::new();
        store
            .upsert(vec![
                chunk("far", "b.md", 0, 5, vec![0.0, 1.0]),
                chunk("near", "a.md", 0, 5, vec![1.0, 0.0]),
            ])
            .await
            .expect("upsert");

        let hits = store
            .query(&[1.0, 0.0], 10, &[])
            .await
            .expect("query");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "near");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn query_excludes_paths_even_at_zero_distance() {
        let store = MemoryVectorStore::new();
        store
            .upsert(vec![
                chunk("self", "a.md", 0, 5, vec![1.0, 0.0]),
                chunk("other", "b.md", 0, 5, vec![0.9, 0.1]),
            ])
            .await
            .expect("upsert");

        let hits = store
            .query(&[1.0, 0.0], 5, &["a.md".to_string()])
            .await
            .expect("query");
        assert!(hits.iter().all(|hit| hit.file_path != "a.md"));
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn query_respects_limit() {
        let store = MemoryVectorStore::new();
        let chunks: Vec<StoredChunk> = (0..10)
            .map(|i| chunk(&format!("c{i}"), &format!("n{i}.md"), 0, 5, vec![1.0, i as f32]))
            .collect();
        store.upsert(chunks).await.expect("upsert");

        let hits = store.query(&[1.0, 0.0], 3, &[]).await.expect("query");
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn vectors_for_unknown_path_is_none() {
        let store = MemoryVectorStore::new();
        assert!(store
            .vectors_for_path("missing.md")
            .await
            .expect("query")
            .is_none());
    }

    #[tokio::test]
    async fn rebuild_empties_the_store() {
        let store = MemoryVectorStore::new();
        store
            .upsert(vec![chunk("a", "note.md", 0, 10, vec![1.0])])
            .await
            .expect("upsert");
        store.rebuild().await.expect("rebuild");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn closed_store_rejects_operations() {
        let store = MemoryVectorStore::new();
        store.close().await.expect("close");

        let result = store.upsert(vec![]).await;
        assert!(matches!(result, Err(AppError::Store(_))));
        let result = store.query(&[1.0], 1, &[]).await;
        assert!(matches!(result, Err(AppError::Store(_))));
    }
}
