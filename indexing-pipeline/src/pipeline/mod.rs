use std::sync::Arc;

use tracing::{debug, info, warn};

use chunking_pipeline::{CacheTuning, ChunkCache, ChunkingTuning};
use common::{error::AppError, storage::store::UpsertRecord};
use worker_rpc::WorkerProxy;

use crate::progress::ProgressSink;
use crate::source::DocumentSource;

#[derive(Debug, Clone, Default)]
pub struct IndexingConfig {
    pub chunking: ChunkingTuning,
    pub cache: CacheTuning,
}

/// Result of a full indexing run. Counts reflect what actually happened,
/// not what was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutcome {
    pub total_vectors_processed: usize,
    pub documents_indexed: usize,
    pub documents_skipped: usize,
}

/// Turns documents into stored vectors.
///
/// Chunking happens per document through the content-addressed cache;
/// chunk records accumulate across the whole run and go to the worker in
/// one batched embed+upsert call, which is what amortizes embedding cost.
pub struct IndexingPipeline {
    proxy: Arc<WorkerProxy>,
    source: Arc<dyn DocumentSource>,
    progress: Arc<dyn ProgressSink>,
    cache: ChunkCache,
}

impl IndexingPipeline {
    pub fn new(
        proxy: Arc<WorkerProxy>,
        source: Arc<dyn DocumentSource>,
        progress: Arc<dyn ProgressSink>,
        config: IndexingConfig,
    ) -> Result<Self, AppError> {
        if config.chunking.max_chunk_characters == 0 {
            return Err(AppError::Validation(
                "max_chunk_characters must be positive".into(),
            ));
        }
        if config.chunking.min_sentence_characters >= config.chunking.max_sentence_characters {
            return Err(AppError::Validation(
                "sentence length bounds: min must be below max".into(),
            ));
        }

        Ok(Self {
            proxy,
            source,
            progress,
            cache: ChunkCache::new(config.chunking, config.cache),
        })
    }

    /// Indexes every document the source lists.
    ///
    /// A single document failing to read or chunk is logged and counted as
    /// skipped; the run continues. A backend failure on the final batched
    /// call is systemic and propagates.
    #[tracing::instrument(skip_all)]
    pub async fn index_all(&self) -> Result<IndexOutcome, AppError> {
        let documents = self.source.list_documents().await?;
        let total = documents.len();
        if total == 0 {
            self.progress.on_progress("No documents to index", true);
            return Ok(IndexOutcome {
                total_vectors_processed: 0,
                documents_indexed: 0,
                documents_skipped: 0,
            });
        }

        let mut records: Vec<UpsertRecord> = Vec::new();
        let mut indexed = 0usize;
        let mut skipped = 0usize;

        for (position, path) in documents.iter().enumerate() {
            match self.collect_document(path).await {
                Ok(Some(mut document_records)) => {
                    records.append(&mut document_records);
                    indexed += 1;
                }
                Ok(None) => {
                    debug!(path = %path, "skipping blank document");
                    skipped += 1;
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "skipping document after failure");
                    skipped += 1;
                }
            }

            let percent = (position + 1) * 100 / total;
            self.progress.on_progress(
                &format!("Indexing documents: {}/{total} ({percent}%)", position + 1),
                false,
            );

            // Let interactive work interleave between documents.
            tokio::task::yield_now().await;
        }

        let stored = if records.is_empty() {
            0
        } else {
            self.proxy.vectorize_and_store(records).await?
        };

        info!(stored, indexed, skipped, "indexing run finished");
        self.progress.on_progress(
            &format!("Stored {stored} vectors from {indexed} documents ({skipped} skipped)"),
            true,
        );

        Ok(IndexOutcome {
            total_vectors_processed: stored,
            documents_indexed: indexed,
            documents_skipped: skipped,
        })
    }

    /// Computes a document-level vector for one document without
    /// persisting anything: chunk, embed, average. `None` for blank or
    /// chunk-less documents.
    #[tracing::instrument(skip_all, fields(path = %path))]
    pub async fn index_note(&self, path: &str) -> Result<Option<Vec<f32>>, AppError> {
        let text = self.source.read_document(path).await?;
        self.vector_for_text(&text).await
    }

    /// Same as [`Self::index_note`] but for text the source does not know
    /// about yet (unsaved editor content).
    pub async fn vector_for_text(&self, text: &str) -> Result<Option<Vec<f32>>, AppError> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let chunks = self.cache.get_or_compute(text).await;
        if chunks.is_empty() {
            return Ok(None);
        }

        let texts: Vec<String> = chunks.into_iter().map(|chunk| chunk.text).collect();
        let vectors = self.proxy.embed_batch(texts).await?;
        if vectors.is_empty() {
            return Ok(None);
        }

        let vector = self.proxy.average_vectors(vectors).await?;
        Ok(Some(vector))
    }

    /// Explicit reset: clears the backing store and the chunk cache.
    pub async fn rebuild(&self) -> Result<(), AppError> {
        self.proxy.rebuild_store().await?;
        self.cache.clear().await;
        Ok(())
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    async fn collect_document(&self, path: &str) -> Result<Option<Vec<UpsertRecord>>, AppError> {
        let text = self.source.read_document(path).await?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        let chunks = self.cache.get_or_compute(&text).await;
        if chunks.is_empty() {
            return Ok(None);
        }

        let records = chunks
            .into_iter()
            .map(|chunk| UpsertRecord {
                file_path: path.to_string(),
                chunk_offset_start: chunk.offset_start(),
                chunk_offset_end: chunk.offset_end(),
                text: chunk.text,
            })
            .collect();

        Ok(Some(records))
    }
}
