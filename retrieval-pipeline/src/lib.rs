//! Similarity retrieval over the persisted vector store.
//!
//! Thin by design: ranking and tie order belong to the store, exclusion
//! filtering travels with the query, and the only logic living here is
//! the empty-vector short-circuit and document-vector recovery.

pub mod links;

pub use links::{exclusion_set, extract_wikilinks};

use tracing::instrument;

use common::{error::AppError, storage::store::SimilarityResultItem};
use worker_rpc::WorkerProxy;

/// Nearest neighbors of `vector`, ascending by distance, omitting every
/// path in `exclude_paths`.
///
/// An empty query vector returns no results without issuing a call —
/// there is nothing meaningful to compare against. Ties keep the store's
/// own stable order; this layer never re-sorts.
#[instrument(skip_all, fields(limit, excluded = exclude_paths.len()))]
pub async fn find_similar(
    proxy: &WorkerProxy,
    vector: &[f32],
    limit: usize,
    exclude_paths: Vec<String>,
) -> Result<Vec<SimilarityResultItem>, AppError> {
    if vector.is_empty() {
        return Ok(Vec::new());
    }

    let items = proxy
        .query_similar(vector.to_vec(), limit, exclude_paths)
        .await?;
    Ok(items)
}

/// Document-level vector for `path`, averaged from its persisted chunk
/// vectors.
///
/// `Ok(None)` means the path has never been indexed — distinct from an
/// indexed document whose vector happens to be zero — so callers can
/// prompt a re-index instead of silently showing nothing.
#[instrument(skip_all, fields(path = %path))]
pub async fn document_vector(
    proxy: &WorkerProxy,
    path: &str,
) -> Result<Option<Vec<f32>>, AppError> {
    let Some(vectors) = proxy.vectors_for_path(path).await? else {
        return Ok(None);
    };
    if vectors.is_empty() {
        return Ok(None);
    }

    let vector = proxy.average_vectors(vectors).await?;
    Ok(Some(vector))
}
