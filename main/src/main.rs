use std::sync::Arc;

use common::{
    storage::memory::MemoryVectorStore,
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use indexing_pipeline::{
    DocumentSource, FsDocumentSource, IndexingConfig, IndexingPipeline, TracingProgressSink,
};
use retrieval_pipeline::{document_vector, exclusion_set, find_similar};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use worker_rpc::{spawn_worker_thread, WorkerServices};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    // Embedding inference and storage live on a dedicated worker thread;
    // everything after this talks to them through the proxy only.
    let embedding_provider = Arc::new(EmbeddingProvider::from_config(&config).await?);
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    let store = Arc::new(MemoryVectorStore::new());
    let proxy = Arc::new(spawn_worker_thread(WorkerServices::new(
        embedding_provider,
        store,
    ))?);

    let source = Arc::new(FsDocumentSource::new(&config.notes_dir));
    let pipeline = IndexingPipeline::new(
        Arc::clone(&proxy),
        Arc::clone(&source) as Arc<dyn DocumentSource>,
        Arc::new(TracingProgressSink),
        IndexingConfig::default(),
    )?;

    info!(notes_dir = %config.notes_dir, "Indexing notes");
    let outcome = pipeline.index_all().await?;
    info!(
        vectors = outcome.total_vectors_processed,
        indexed = outcome.documents_indexed,
        skipped = outcome.documents_skipped,
        "Indexing complete"
    );

    // Show similar notes for the first indexed document.
    if let Some(path) = source.list_documents().await?.first() {
        match document_vector(&proxy, path).await? {
            Some(vector) => {
                let text = source.read_document(path).await?;
                let excluded = exclusion_set(path, &text, config.exclude_linked);
                let similar =
                    find_similar(&proxy, &vector, config.query_limit, excluded).await?;
                info!(path = %path, "Similar notes:");
                for item in similar {
                    info!(
                        "  {} [{}..{}] distance {:.4}",
                        item.file_path, item.chunk_offset_start, item.chunk_offset_end, item.distance
                    );
                }
            }
            None => warn!(path = %path, "Document has no stored vectors; re-index it"),
        }
    }

    proxy.close_store().await?;
    proxy.terminate();

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::storage::memory::MemoryVectorStore;
    use common::utils::embedding::EmbeddingProvider;
    use indexing_pipeline::{
        DocumentSource, FsDocumentSource, IndexingConfig, IndexingPipeline, TracingProgressSink,
    };
    use retrieval_pipeline::{document_vector, exclusion_set, find_similar};
    use worker_rpc::{spawn_worker, WorkerServices};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn smoke_index_and_query_a_small_vault() {
        let vault = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(
            vault.path().join("rust.md"),
            "---\ntitle: rust\n---\nTokio schedules async tasks across worker threads.",
        )
        .await
        .expect("write");
        tokio::fs::write(
            vault.path().join("async.md"),
            "Async scheduling in tokio spreads tasks over worker threads.",
        )
        .await
        .expect("write");
        tokio::fs::write(
            vault.path().join("cooking.md"),
            "Slowly braise the onions in plenty of butter.",
        )
        .await
        .expect("write");

        let embedding = EmbeddingProvider::new_hashed(128).expect("provider");
        let proxy = Arc::new(spawn_worker(WorkerServices::new(
            Arc::new(embedding),
            Arc::new(MemoryVectorStore::new()),
        )));

        let source = Arc::new(FsDocumentSource::new(vault.path()));
        let pipeline = IndexingPipeline::new(
            Arc::clone(&proxy),
            Arc::clone(&source) as Arc<dyn DocumentSource>,
            Arc::new(TracingProgressSink),
            IndexingConfig::default(),
        )
        .expect("pipeline");

        let outcome = pipeline.index_all().await.expect("index");
        assert_eq!(outcome.documents_indexed, 3);
        assert_eq!(outcome.documents_skipped, 0);
        assert!(outcome.total_vectors_processed >= 3);

        let vector = document_vector(&proxy, "rust.md")
            .await
            .expect("call")
            .expect("rust.md indexed");
        let text = source.read_document("rust.md").await.expect("read");
        let excluded = exclusion_set("rust.md", &text, true);
        let similar = find_similar(&proxy, &vector, 5, excluded)
            .await
            .expect("query");

        assert!(!similar.is_empty());
        assert!(similar.iter().all(|item| item.file_path != "rust.md"));
        assert_eq!(similar[0].file_path, "async.md");

        proxy.terminate();
    }
}
