//! Worker side: serves protocol requests against the embedding provider
//! and the vector store, off the caller's critical path.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use common::{
    error::AppError,
    storage::store::{ChunkMetadata, StoredChunk, VectorStore},
    utils::{embedding::EmbeddingProvider, vector},
};

use crate::protocol::{ReplyBody, ReplyEnvelope, RequestBody, RequestEnvelope};
use crate::proxy::WorkerProxy;

/// Everything the worker needs to answer requests.
#[derive(Clone)]
pub struct WorkerServices {
    pub embedding: Arc<EmbeddingProvider>,
    pub store: Arc<dyn VectorStore>,
}

impl WorkerServices {
    pub fn new(embedding: Arc<EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedding, store }
    }
}

/// Serves requests until the request channel closes. Each request gets
/// exactly one reply carrying its correlation id; failures become error
/// replies rather than ending the loop.
pub async fn run_worker_loop(
    mut requests: mpsc::UnboundedReceiver<RequestEnvelope>,
    replies: mpsc::UnboundedSender<ReplyEnvelope>,
    services: WorkerServices,
) {
    info!(backend = services.embedding.backend_label(), "vector worker started");

    while let Some(request) = requests.recv().await {
        let id = request.id.clone();
        let kind = request.body.kind();

        let reply = match handle_request(request.body, &services).await {
            Ok(body) => ReplyEnvelope { id, body },
            Err(err) => {
                debug!(kind, error = %err, "worker request failed");
                ReplyEnvelope::error(id, err.to_string())
            }
        };

        if replies.send(reply).is_err() {
            debug!("reply channel closed; stopping worker loop");
            break;
        }
    }

    info!("vector worker stopped");
}

async fn handle_request(
    body: RequestBody,
    services: &WorkerServices,
) -> Result<ReplyBody, AppError> {
    match body {
        RequestBody::Initialize => {
            let dimension = services.embedding.dimension();
            let report = services.store.ensure_indexes(dimension).await?;
            if !report.success {
                return Err(AppError::Store(report.message));
            }
            Ok(ReplyBody::InitializeResult {
                backend: services.embedding.backend_label().to_string(),
                dimension,
            })
        }
        RequestBody::EmbedBatch { texts } => {
            let vectors = services
                .embedding
                .embed_batch(texts)
                .await
                .map_err(|err| AppError::Embedding(err.to_string()))?;
            Ok(ReplyBody::EmbedBatchResult { vectors })
        }
        RequestBody::AverageVectors { vectors } => Ok(ReplyBody::AverageVectorsResult {
            vector: vector::average(&vectors),
        }),
        RequestBody::VectorizeAndStore { records } => {
            if records.is_empty() {
                return Ok(ReplyBody::VectorizeAndStoreResult { count: 0 });
            }

            let texts: Vec<String> = records.iter().map(|record| record.text.clone()).collect();
            let vectors = services
                .embedding
                .embed_batch(texts)
                .await
                .map_err(|err| AppError::Embedding(err.to_string()))?;
            if vectors.len() != records.len() {
                return Err(AppError::Embedding(format!(
                    "expected {} vectors, got {}",
                    records.len(),
                    vectors.len()
                )));
            }

            let now = Utc::now();
            let chunks: Vec<StoredChunk> = records
                .into_iter()
                .zip(vectors)
                .map(|(record, embedding)| StoredChunk {
                    id: Uuid::new_v4().to_string(),
                    metadata: ChunkMetadata {
                        file_path: record.file_path,
                        start_position: record.chunk_offset_start,
                        end_position: record.chunk_offset_end,
                        created_at: now,
                    },
                    text: record.text,
                    embedding,
                })
                .collect();

            let count = services.store.upsert(chunks).await?;
            Ok(ReplyBody::VectorizeAndStoreResult { count })
        }
        RequestBody::QuerySimilar {
            vector,
            limit,
            exclude_file_paths,
        } => {
            let items = services
                .store
                .query(&vector, limit, &exclude_file_paths)
                .await?;
            Ok(ReplyBody::QuerySimilarResult { items })
        }
        RequestBody::VectorsForPath { path } => {
            let vectors = services.store.vectors_for_path(&path).await?;
            Ok(ReplyBody::VectorsForPathResult { vectors })
        }
        RequestBody::RebuildStore => {
            services.store.rebuild().await?;
            Ok(ReplyBody::RebuildStoreResult)
        }
        RequestBody::EnsureIndexes => {
            let report = services
                .store
                .ensure_indexes(services.embedding.dimension())
                .await?;
            Ok(ReplyBody::EnsureIndexesResult { report })
        }
        RequestBody::CloseStore => {
            services.store.close().await?;
            Ok(ReplyBody::CloseStoreResult)
        }
    }
}

/// Runs the worker on a tokio task and returns a connected proxy.
pub fn spawn_worker(services: WorkerServices) -> WorkerProxy {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();

    tokio::spawn(run_worker_loop(request_rx, reply_tx, services));

    WorkerProxy::connect(request_tx, reply_rx)
}

/// Runs the worker on a dedicated OS thread with its own single-threaded
/// runtime, keeping embedding inference entirely off the caller's runtime.
pub fn spawn_worker_thread(services: WorkerServices) -> Result<WorkerProxy, AppError> {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("vector-worker".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(error = %err, "failed to build worker runtime");
                    return;
                }
            };
            runtime.block_on(run_worker_loop(request_rx, reply_tx, services));
        })
        .map_err(AppError::Io)?;

    Ok(WorkerProxy::connect(request_tx, reply_rx))
}
